use std::path::PathBuf;

use thiserror::Error;

use crate::browser::SessionError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::mosaic::ComposeError;

/// Run-terminating errors
///
/// Discovery and composition coming up empty are separate variants so the
/// caller can tell which phase found nothing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No tile traffic observed")]
    DiscoveryEmpty,

    #[error("No tiles found in {}", cache_dir.display())]
    NoTilesFound { cache_dir: PathBuf },

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Compose(ComposeError),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ComposeError> for PipelineError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::NoTilesFound { cache_dir } => PipelineError::NoTilesFound { cache_dir },
            other => PipelineError::Compose(other),
        }
    }
}

impl PipelineError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::DiscoveryEmpty => 2,
            PipelineError::NoTilesFound { .. } => 3,
            PipelineError::Cancelled => 130,
            _ => 1,
        }
    }
}
