//! Error types for state store components.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by state store primitives.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store refused a read.
    #[error("store read error: {0}")]
    Read(String),

    /// The backing store refused a write or delete.
    #[error("store write error: {0}")]
    Write(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing store is not reachable in this runtime (no window, storage disabled).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("storage lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
