use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// The cache holds nothing that can be placed
    #[error("No tiles found in {}", cache_dir.display())]
    NoTilesFound { cache_dir: PathBuf },

    #[error("Canvas {width}x{height} exceeds the {limit} pixel limit")]
    CanvasTooLarge { width: u64, height: u64, limit: u64 },

    #[error("Failed to read tile cache {}: {source}", path.display())]
    ReadCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write mosaic {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode mosaic: {0}")]
    Encode(#[from] image::ImageError),
}
