//! Transfer headers and file metadata.

use crate::error::{TransferError, TransferResult};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifies the destination (or source) of a transfer.
///
/// Sent as the first message of a client-streamed upload or as the request
/// of a server-streamed download. Both fields are mandatory and validated
/// before any bytes are exchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferHeader {
    /// Owning namespace (one storage bucket per authenticated identity).
    pub namespace: String,
    /// `/`-separated object key within the namespace. Not normalized;
    /// callers are responsible for traversal protection.
    pub path: String,
}

impl TransferHeader {
    /// Validate and build a header. Fails fast with `InvalidHeader` if
    /// either field is empty.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> TransferResult<Self> {
        let namespace = namespace.into();
        let path = path.into();

        if namespace.is_empty() {
            return Err(TransferError::InvalidHeader("empty namespace".to_string()));
        }
        if path.is_empty() {
            return Err(TransferError::InvalidHeader("empty object path".to_string()));
        }

        Ok(Self { namespace, path })
    }
}

/// Immutable snapshot of a stored object, produced only by listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    /// Full object key within the namespace.
    pub name: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time at listing time.
    #[serde(rename = "lastModified", with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}
