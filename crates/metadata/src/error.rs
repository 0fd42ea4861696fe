//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

impl From<MetadataError> for runlet_core::Error {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => runlet_core::Error::NotFound(what),
            MetadataError::AlreadyExists(what) => runlet_core::Error::NameConflict(what),
            other => runlet_core::Error::StoreUnavailable(other.to_string()),
        }
    }
}
