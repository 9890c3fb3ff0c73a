//! Error types for the sync agent.

use tally_protocol::Version;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
///
/// "No more work" is not an error: the hub's empty answer is carried as
/// [`tally_protocol::Batch::Empty`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error talking to the hub.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call could succeed if made again.
        retryable: bool,
    },

    /// The hub sent something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The hub answered with a non-success status.
    #[error("hub returned status {status}: {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The ledger failed or refused an operation.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Applying an update failed. Updates before it remain committed.
    #[error("update {version} failed: {source}")]
    UpdateFailed {
        /// Version of the failing update.
        version: Version,
        /// Underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the failing call could succeed on a later run.
    ///
    /// The agent itself never retries; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Version of the update that failed, if this is an update failure.
    pub fn failed_update(&self) -> Option<Version> {
        match self {
            SyncError::UpdateFailed { version, .. } => Some(*version),
            _ => None,
        }
    }
}
