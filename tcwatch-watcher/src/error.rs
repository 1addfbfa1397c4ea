//! Error types for the build watcher

use tcwatch_client::ClientError;
use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors surfaced by the build watcher
///
/// Only configuration and lifecycle errors reach callers. Fetch failures
/// inside the polling loops are logged and retried on the next tick.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Configuration rejected at construction time
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Querying the CI server failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] ClientError),

    /// Handlers and `start` are only accepted before the watcher runs
    #[error("build watcher is already started")]
    AlreadyStarted,

    /// `stop` called on a watcher that is not running
    #[error("build watcher is not started")]
    NotStarted,
}

impl WatchError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}
