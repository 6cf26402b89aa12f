//! Error types for the mailring-queue crate.

use thiserror::Error;

/// Top-level queue store error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store could not be reached or rejected the command.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization or deserialization of a queue entry failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// An index based operation addressed a position that does not exist.
    #[error("Index {index} out of range for queue {key}")]
    OutOfRange { key: String, index: usize },

    /// The store refused a write because it is full.
    #[error("Queue capacity exceeded: {len}/{capacity} entries")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Internal error (lock poisoning, injected test failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Whether this error concerns the content of an entry rather than the store
    #[must_use]
    pub const fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The entry decoded but left bytes behind.
    #[error("Corrupted entry: {0}")]
    Corrupted(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for QueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
