//! Errors from storage operations.

use thiserror::Error;

/// Errors from the large-object store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The reference has been evicted or never existed.
    #[error("not found: {0}")]
    NotFound(String),
    /// An I/O error occurred writing or reading the optional disk tier.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the session store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// Session, message, or snapshot not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The underlying database reported an error.
    #[error("database error: {0}")]
    Database(String),
    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
