//! Error types for the transfer domain.

use thiserror::Error;

/// Errors that can terminate a transfer.
///
/// Every background drain/pump task records at most one of these on its
/// transfer's completion signal; the synchronous caller is the only place
/// that turns a recorded error into a protocol-level failure.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Client protocol violation in the transfer header. Fatal, no retry.
    #[error("invalid transfer header: {0}")]
    InvalidHeader(String),

    /// The backend reports the requested object missing.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The backend rejected or failed a write. Surfaced verbatim, no retry.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    /// The backend failed while serving a read.
    #[error("storage read failed: {0}")]
    StorageReadFailed(String),

    /// The peer disconnected or the transport failed while receiving.
    #[error("stream receive failed: {0}")]
    StreamReceiveFailed(String),

    /// The peer disconnected or the transport failed while sending.
    #[error("stream send failed: {0}")]
    StreamSendFailed(String),

    /// A pipe write after the read side was released.
    #[error("pipe closed")]
    ClosedPipe,

    /// Credential validation failed before any relay logic ran.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The transfer was cancelled before completion.
    #[error("transfer cancelled: {0}")]
    Cancelled(String),
}

/// Result type alias for transfer operations.
pub type TransferResult<T> = std::result::Result<T, TransferError>;
