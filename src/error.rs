//! Crate-wide error types.

use thiserror::Error;

/// Failures surfaced by a [`crate::queue::QueueAdapter`] implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The underlying transport (socket, file, in-memory lock) failed.
    #[error("queue transport error: {0}")]
    Transport(String),
    /// The broker rejected the request (bad tube, unknown task id, ...).
    #[error("queue rejected request: {0}")]
    Rejected(String),
    /// A response from the broker could not be decoded.
    #[error("malformed queue response: {0}")]
    Decode(String),
}

/// Failures that escape the dispatch loop and are handled by the supervisor.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The queue adapter failed in a way the reaper/loop could not swallow.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Configuration was invalid at load time.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A fatal startup failure (daemonize, pidfile, bind).
    #[error("startup failed: {0}")]
    Startup(String),
}

/// Application-facing result alias for startup and top-level wiring.
pub type AppResult<T> = Result<T, anyhow::Error>;
