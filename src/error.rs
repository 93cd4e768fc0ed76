//! SILT - Custom Error Types
//! Defines the error hierarchy for the storage engine core.

use std::sync::Arc;

use thiserror::Error;

/// Custom Result type for the Silt engine.
pub type Result<T> = std::result::Result<T, SiltError>;

/// Error types for the Silt storage engine.
///
/// The enum is `Clone` so a single outcome can fan out to every waiter
/// of a completion signal; I/O errors are wrapped in an `Arc` for that
/// reason.
#[derive(Error, Debug, Clone)]
pub enum SiltError {
    /// I/O errors from object store operations.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// The engine (or one of its queues) has begun shutting down.
    /// Terminal and user-visible; never retried internally.
    #[error("engine stopped")]
    Stopped,

    /// A batch must contain at least one entry.
    #[error("batch contains no entries")]
    EmptyBatch,

    /// A watermark wait gave up before the target timestamp was covered.
    /// Distinct from `Stopped`: the engine may still be healthy.
    #[error("deadline exceeded waiting for timestamp {0}")]
    WaitDeadline(u64),

    /// Data corruption detected (CRC mismatch, truncated artifact).
    #[error("data corruption detected: {0}")]
    Corruption(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An object already exists at the target path.
    #[error("object already exists at {0}")]
    SegmentExists(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for SiltError {
    fn from(err: std::io::Error) -> Self {
        SiltError::Io(Arc::new(err))
    }
}
