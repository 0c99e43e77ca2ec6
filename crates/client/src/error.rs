//! Error types for the generation backend client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Client could not be built (bad credential characters, TLS setup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request refused before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection failed, timed out, or was reset
    #[error("Network error: {0}")]
    Transport(String),

    /// Backend answered with a non-2xx status
    #[error("Server error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
