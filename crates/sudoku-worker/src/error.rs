//! Errors on the worker handle.

use thiserror::Error;

/// Errors that can occur when talking to a worker through its handle.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker stopped and no longer reads commands.
    #[error("Worker channel closed")]
    ChannelClosed,

    /// The command channel is full.
    #[error("Worker command queue full")]
    QueueFull,

    /// The worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    TaskFailed(String),
}
