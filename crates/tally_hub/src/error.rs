//! Error types for the hub.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur in the hub.
#[derive(Error, Debug)]
pub enum HubError {
    /// Invalid request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No endpoint at this path.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Internal hub error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid hub configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HubError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::InvalidRequest(_) => 400,
            HubError::UnknownEndpoint(_) => 404,
            HubError::Internal(_) | HubError::Config(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
