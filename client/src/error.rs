//! Error types for the client.

use crate::config::ConfigError;
use thiserror::Error;

/// Failure talking to the remote profile store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid remote url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Transport failures, server errors and rate limiting may succeed on a
    /// later attempt; everything else will not.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            RemoteError::Decode(_) | RemoteError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Errors surfaced by the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] lumina_engine::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sync is disabled or the device is offline")]
    Offline,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RemoteError::Transport("reset".into()).is_transient());
        assert!(RemoteError::Status { status: 503, body: String::new() }.is_transient());
        assert!(RemoteError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!RemoteError::Status { status: 404, body: String::new() }.is_transient());
        assert!(!RemoteError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!RemoteError::Decode("eof".into()).is_transient());
    }
}
