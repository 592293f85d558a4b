use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Batch-level fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to create tile cache {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why a single tile could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchFailureReason {
    #[error("URL has no file name")]
    InvalidUrl,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to write tile: {0}")]
    Io(String),
}
