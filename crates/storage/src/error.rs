//! Storage error types.

use ferry_core::TransferError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Map to a transfer error for a failed read path.
    pub fn into_read_error(self) -> TransferError {
        match self {
            StorageError::NotFound(key) => TransferError::ObjectNotFound(key),
            other => TransferError::StorageReadFailed(other.to_string()),
        }
    }

    /// Map to a transfer error for a failed write path.
    pub fn into_write_error(self) -> TransferError {
        match self {
            StorageError::NotFound(key) => TransferError::ObjectNotFound(key),
            other => TransferError::StorageWriteFailed(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
