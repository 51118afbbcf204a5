//! Error types for ingestion components.

use thiserror::Error;

/// Errors produced while building or driving the ingestion pipeline.
///
/// Per-message outcomes (drops, handler failures) are never reported through
/// this type; they are counted in the metrics instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Static configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `start` was called on a manager whose workers are already running.
    #[error("worker pool already running")]
    AlreadyRunning,
    /// The manager was stopped and cannot be restarted.
    #[error("queue manager has been stopped")]
    Stopped,
    /// A worker thread or its runtime could not be created.
    #[error("worker spawn failed: {0}")]
    WorkerSpawn(String),
}

/// Failure reported by a category handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The downstream integration reported an error.
    #[error("handler failed: {0}")]
    Failed(String),
    /// No handler is registered for the message category.
    #[error("no handler registered for category `{0}`")]
    UnknownCategory(String),
    /// The invocation exceeded the configured handler timeout.
    #[error("handler timed out after {0} ms")]
    Timeout(u64),
    /// The handler panicked; the worker survived.
    #[error("handler panicked")]
    Panicked,
}

impl HandlerError {
    /// Convenience constructor for integration failures.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
