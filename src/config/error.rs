use std::path::PathBuf;

use thiserror::Error;

/// Errors reading the target URL
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read URL file {}: {source}", path.display())]
    UrlFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("URL file {} is empty", .0.display())]
    EmptyUrlFile(PathBuf),

    #[error("Invalid target URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },
}
