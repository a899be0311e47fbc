//! Local filesystem storage backend.
//!
//! Each namespace maps to a directory directly under the storage root;
//! object paths become files below it. Writes land in a uniquely-named
//! temp file and are renamed into place on commit, so readers never
//! observe a partially-written object.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::FileInfo;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Validate a namespace: a single path component, nothing that could
    /// escape the storage root.
    fn validate_namespace(namespace: &str) -> StorageResult<()> {
        if namespace.is_empty() {
            return Err(StorageError::InvalidNamespace(
                "namespace must not be empty".to_string(),
            ));
        }
        let mut components = Path::new(namespace).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(()),
            _ => Err(StorageError::InvalidNamespace(format!(
                "namespace must be a single path component: {namespace}"
            ))),
        }
    }

    /// Get the full path for an object, with path traversal protection.
    fn object_path(&self, namespace: &str, key: &str) -> StorageResult<PathBuf> {
        Self::validate_namespace(namespace)?;

        if key.is_empty() {
            return Err(StorageError::InvalidKey("key must not be empty".to_string()));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }

        Ok(self.root.join(namespace).join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()> {
        Self::validate_namespace(namespace)?;
        fs::create_dir_all(self.root.join(namespace)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(
        &self,
        namespace: &str,
        path: &str,
    ) -> StorageResult<Box<dyn StreamingUpload>> {
        self.ensure_namespace(namespace).await?;
        let final_path = self.object_path(namespace, path)?;
        self.ensure_parent(&final_path).await?;

        // Unique dot-prefixed temp name in the same directory: concurrent
        // writes to the same key never clash, listings skip it, and the
        // final rename stays on one filesystem.
        let temp_path = final_path.with_file_name(format!(".tmp.{}", Uuid::new_v4()));
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file,
            temp_path,
            final_path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, namespace: &str, path: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        self.ensure_namespace(namespace).await?;
        let full_path = self.object_path(namespace, path)?;
        let file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        // Stream the file in chunks instead of loading it into memory
        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, namespace: &str, path: &str) -> StorageResult<()> {
        self.ensure_namespace(namespace).await?;
        let full_path = self.object_path(namespace, path)?;
        fs::remove_file(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, namespace: &str, prefix: &str) -> StorageResult<Vec<FileInfo>> {
        self.ensure_namespace(namespace).await?;

        // Split the prefix into a directory part and a file-name remainder,
        // mirroring delimiter-style object listings: only entries directly
        // under the directory part are returned, never nested ones.
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..=idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };

        let dir_path = if dir_part.is_empty() {
            Self::validate_namespace(namespace)?;
            self.root.join(namespace)
        } else {
            self.object_path(namespace, dir_part.trim_end_matches('/'))?
        };

        let mut results = Vec::new();
        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(name_prefix) || name.starts_with(".tmp.") {
                continue;
            }
            let metadata = entry.metadata().await?;
            let last_modified = metadata
                .modified()
                .map(time::OffsetDateTime::from)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
            results.push(FileInfo {
                name: format!("{dir_part}{name}"),
                size: metadata.len(),
                last_modified,
            });
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {:?}",
                self.root
            )));
        }

        Ok(())
    }
}

/// Streaming upload for the filesystem backend.
struct FilesystemUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        // Flush to disk before the rename makes the object visible
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut upload = backend.put_stream("alice", "notes/todo.txt").await.unwrap();
        upload.write(Bytes::from_static(b"hello ")).await.unwrap();
        upload.write(Bytes::from_static(b"world")).await.unwrap();
        assert_eq!(upload.finish().await.unwrap(), 11);

        let stream = backend.get_stream("alice", "notes/todo.txt").await.unwrap();
        assert_eq!(collect(stream).await, b"hello world");
    }

    #[tokio::test]
    async fn aborted_upload_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut upload = backend.put_stream("alice", "partial.bin").await.unwrap();
        upload.write(Bytes::from_static(b"half-written")).await.unwrap();
        upload.abort().await.unwrap();

        let err = backend.get_stream("alice", "partial.bin").await.err().unwrap();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(backend.list("alice", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        assert!(backend.get_stream("alice", "../escape").await.is_err());
        assert!(backend.get_stream("alice", "/absolute/path").await.is_err());
        assert!(backend.get_stream("alice", "foo/../bar").await.is_err());
        assert!(backend.get_stream("../alice", "file").await.is_err());
        assert!(backend.get_stream("a/b", "file").await.is_err());
    }

    #[tokio::test]
    async fn delete_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let err = backend.delete("alice", "no-such-file").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_is_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        for path in ["docs/a.txt", "docs/b.txt", "docs/sub/nested.txt", "top.txt"] {
            let mut upload = backend.put_stream("alice", path).await.unwrap();
            upload.write(Bytes::from_static(b"x")).await.unwrap();
            upload.finish().await.unwrap();
        }

        let names: Vec<String> = backend
            .list("alice", "docs/")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["docs/a.txt", "docs/b.txt"]);

        let root_names: Vec<String> = backend
            .list("alice", "")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(root_names, vec!["top.txt"]);
    }

    #[tokio::test]
    async fn list_respects_name_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        for path in ["report-2024.txt", "report-2025.txt", "summary.txt"] {
            let mut upload = backend.put_stream("alice", path).await.unwrap();
            upload.write(Bytes::from_static(b"x")).await.unwrap();
            upload.finish().await.unwrap();
        }

        let names: Vec<String> = backend
            .list("alice", "report-")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["report-2024.txt", "report-2025.txt"]);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut upload = backend.put_stream("alice", "file.txt").await.unwrap();
        upload.write(Bytes::from_static(b"alice's")).await.unwrap();
        upload.finish().await.unwrap();

        let err = backend.get_stream("bob", "file.txt").await.err().unwrap();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(backend.list("bob", "").await.unwrap().is_empty());
    }
}
