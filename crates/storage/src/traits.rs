//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::FileInfo;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Object store abstraction with per-namespace isolation.
///
/// A namespace groups all objects belonging to one owner (a bucket on S3,
/// a directory on the filesystem). Every operation provisions its
/// namespace on first use, so callers never create namespaces explicitly.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Ensure the namespace exists, creating it if missing. Idempotent:
    /// concurrent callers racing on the same namespace all succeed.
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()>;

    /// Start a streaming write of an object.
    ///
    /// Nothing becomes visible under the key until `finish` returns;
    /// an aborted or dropped upload never commits a partial object.
    async fn put_stream(
        &self,
        namespace: &str,
        path: &str,
    ) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Get an object's content as a byte stream.
    async fn get_stream(&self, namespace: &str, path: &str) -> StorageResult<ByteStream>;

    /// Delete an object. Returns `NotFound` if it does not exist.
    async fn delete(&self, namespace: &str, path: &str) -> StorageResult<()>;

    /// List objects directly under `prefix`, non-recursively: an object
    /// nested below a further separator does not appear. Names are
    /// relative to the namespace root.
    async fn list(&self, namespace: &str, prefix: &str) -> StorageResult<Vec<FileInfo>>;

    /// Get the name of this storage backend ("s3", "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup to ensure the backend is reachable
    /// before accepting requests. The default implementation returns
    /// Ok(()), suitable for backends without a remote dependency.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Commit the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload, discarding everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
