use thiserror::Error;

use crate::storage::StorageError;

/// Error outputs from `factorlock`
#[derive(Debug, Error)]
pub enum FactorLockError {
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
    /// The factor name is not one of `face`, `voice`, `retina` or `proximity`
    #[error("unknown_factor: {0}")]
    UnknownFactor(String),
    /// Unexpected error serializing information
    #[error("serialization_error: {0}")]
    SerializationError(String),
    /// A state store failed to read or write
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for FactorLockError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error.to_string())
    }
}
