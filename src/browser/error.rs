use thiserror::Error;

/// Errors raised while opening a browser session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Browser driver not found: {0}")]
    BinaryNotFound(String),

    #[error("No browser driver configured")]
    NotConfigured,

    #[error("Failed to spawn browser driver: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Invalid HAR file: {0}")]
    InvalidHar(String),

    #[error("Session failed to open: {0}")]
    OpenFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
