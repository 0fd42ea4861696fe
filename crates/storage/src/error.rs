//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for runlet_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => runlet_core::Error::NotFound(key),
            other => runlet_core::Error::StoreUnavailable(other.to_string()),
        }
    }
}
