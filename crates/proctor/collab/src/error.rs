//! Error types for collaborator calls

use proctor_monitor::LogDeliveryError;
use thiserror::Error;

/// Result type for collaborator calls
pub type CollabResult<T> = Result<T, CollabError>;

/// Errors raised while talking to an external collaborator
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CollabError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CollabError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CollabError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<CollabError> for LogDeliveryError {
    fn from(err: CollabError) -> Self {
        LogDeliveryError::new(err.to_string())
    }
}
