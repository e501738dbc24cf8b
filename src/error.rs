use thiserror::Error;

/// Unified error type for snapbooth
#[derive(Error, Debug)]
pub enum BoothError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed server response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Capture(String),

    #[error("Failed to load {path}: {reason}")]
    AssetLoad { path: String, reason: String },

    #[error("Invalid asset: {0}")]
    Asset(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type BoothResult<T> = Result<T, BoothError>;
