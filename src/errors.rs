//! Node Watcher Error Hierarchy
//!
//! Errors are split by the layer that produces them: the coordination client
//! (`ClientError`), the watcher itself (`Error`) and configuration loading.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Initial existence check or subscription arming failed.
    /// Surfaced to the caller of `NodeWatcher::new`, never retried.
    #[error("Failed to construct watcher for {path}: {source}")]
    Construction {
        path: String,
        #[source]
        source: ClientError,
    },

    /// A get-data round-trip failed after the retry policy was exhausted
    #[error("Failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// Retry policy exhaustion
    #[error("Gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: ClientError,
    },

    /// Error returned by the coordination client
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures reported by a [`CoordinationClient`](crate::CoordinationClient).
///
/// Session and connection recovery belong to the client; the watcher only
/// decides whether a failed read is worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Connection to the ensemble was lost mid-request
    #[error("Connection lost")]
    ConnectionLoss,

    /// Session expired; the client must re-establish it and replay watches
    #[error("Session expired")]
    SessionExpired,

    /// Request did not complete within the client's own timeout
    #[error("Operation timed out")]
    OperationTimeout,

    /// Operation requires a node that does not exist
    #[error("No node at {0}")]
    NoNode(String),

    /// Node already exists or still has children
    #[error("Conflicting node state at {path}: {reason}")]
    Conflict { path: String, reason: &'static str },

    /// Caller lacks permission on the node
    #[error("Not authorized: {0}")]
    NoAuth(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether repeating the same read may succeed without outside help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::ConnectionLoss | ClientError::OperationTimeout)
    }
}
