//! Object storage abstraction and backends for Ferry.
//!
//! This crate provides:
//! - A namespaced object store trait with streaming reads and writes
//! - Atomic streaming uploads (nothing visible until commit)
//! - Backends: local filesystem and S3-compatible

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{ByteStream, ObjectStore, StreamingUpload};

use ferry_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                endpoint,
                region,
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )?;
            Ok(Arc::new(backend))
        }
    }
}
