//! Error types for scenecast
//!
//! Only construction-time operations (configuration, opening sessions,
//! scheduler submission) return errors. The streaming path reports
//! failures through status flags and logs instead.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for scenecast operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Error types for the export core
#[derive(Debug, Error)]
pub enum ExportError {
    /// I/O error (opening or writing a destination)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value could not be encoded
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Task submitted after the scheduler was stopped
    #[error("Scheduler has been stopped")]
    SchedulerStopped,

    /// Task submitted while the scheduler queue was at capacity
    #[error("Scheduler queue is full")]
    QueueFull,
}

impl ExportError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ExportError::Config(msg.into())
    }

    /// Create an encoding error
    pub fn encode(msg: impl Into<String>) -> Self {
        ExportError::Encode(msg.into())
    }
}
