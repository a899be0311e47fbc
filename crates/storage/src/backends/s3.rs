//! S3-compatible storage backend using AWS SDK.
//!
//! Each namespace maps to its own bucket, which is provisioned on first
//! use. Built for MinIO-style deployments where the configured credentials
//! may create buckets.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectStore, StreamingUpload};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use bytes::Bytes;
use ferry_core::FileInfo;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Minimum part size for S3 multipart uploads (5 MiB).
/// S3 requires all parts except the last to be at least 5 MB.
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// S3-compatible object store using AWS SDK.
pub struct S3Backend {
    client: Client,
    endpoint: String,
    region: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

fn map_s3_operation_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`)
    ///   instead of virtual-hosted style (`bucket.endpoint/key`). Required
    ///   for MinIO and most S3-compatible services.
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        let (key_id, secret) = match (access_key_id, secret_access_key) {
            (Some(key_id), Some(secret)) => (key_id, secret),
            _ => {
                return Err(StorageError::Config(
                    "s3 config requires both access_key_id and secret_access_key".to_string(),
                ));
            }
        };

        // Handle bare host:port endpoints (e.g., "minio:9000") by prepending http://
        let endpoint_lower = endpoint.to_lowercase();
        let normalized_endpoint =
            if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
                endpoint.to_string()
            } else {
                format!("http://{endpoint}")
            };

        let credentials = Credentials::new(key_id, secret, None, None, "ferry-config");
        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .endpoint_url(&normalized_endpoint);

        if force_path_style {
            config_builder = config_builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(config_builder.build()),
            endpoint: normalized_endpoint,
            region: region.to_string(),
        })
    }

    /// Validate a namespace as a usable bucket name.
    fn bucket_name(namespace: &str) -> StorageResult<&str> {
        if namespace.is_empty() {
            return Err(StorageError::InvalidNamespace(
                "namespace must not be empty".to_string(),
            ));
        }
        if namespace.contains('/') || namespace.contains("..") {
            return Err(StorageError::InvalidNamespace(format!(
                "namespace is not a valid bucket name: {namespace}"
            )));
        }
        Ok(namespace)
    }

    /// Convert an AWS SDK error to StorageError, mapping 404 to NotFound.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        map_s3_operation_error(err)
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
                    if service_err.raw().status().as_u16() == 404 {
                        return Ok(false);
                    }
                }
                Err(map_s3_operation_error(err))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn ensure_namespace(&self, namespace: &str) -> StorageResult<()> {
        let bucket = Self::bucket_name(namespace)?;

        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        // Concurrent callers may race on creation; losing the race is fine.
        if let Err(err) = self.client.create_bucket().bucket(bucket).send().await {
            let service_err = err.into_service_error();
            if !(service_err.is_bucket_already_owned_by_you()
                || service_err.is_bucket_already_exists())
            {
                return Err(StorageError::S3(Box::new(service_err)));
            }
        }

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_stream(
        &self,
        namespace: &str,
        path: &str,
    ) -> StorageResult<Box<dyn StreamingUpload>> {
        self.ensure_namespace(namespace).await?;
        let bucket = Self::bucket_name(namespace)?;

        let create_output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        let upload_id = create_output
            .upload_id()
            .ok_or_else(|| StorageError::Config("S3 did not return upload_id".to_string()))?
            .to_string();

        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            bucket: bucket.to_string(),
            key: path.to_string(),
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            bytes_written: 0,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
        }))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, namespace: &str, path: &str) -> StorageResult<ByteStream> {
        self.ensure_namespace(namespace).await?;
        let bucket = Self::bucket_name(namespace)?;

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, path))?;

        // Wrap the SDK body as an AsyncRead, then chunk it back out
        let async_read = output.body.into_async_read();
        let reader_stream = ReaderStream::new(async_read);

        use futures::StreamExt;
        let stream = reader_stream.map(|result| result.map_err(StorageError::Io));

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, namespace: &str, path: &str) -> StorageResult<()> {
        self.ensure_namespace(namespace).await?;
        let bucket = Self::bucket_name(namespace)?;

        // S3 delete_object doesn't error on missing keys, so head first to
        // report NotFound
        if !self.object_exists(bucket, path).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }

        self.client
            .delete_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list(&self, namespace: &str, prefix: &str) -> StorageResult<Vec<FileInfo>> {
        self.ensure_namespace(namespace).await?;
        let bucket = Self::bucket_name(namespace)?;

        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                // Delimited listing: nested objects fold into common
                // prefixes, which we do not report
                .delimiter("/");

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(map_s3_operation_error)?;

            for obj in output.contents() {
                let Some(key) = obj.key() else { continue };
                let last_modified = obj
                    .last_modified()
                    .and_then(|dt| time::OffsetDateTime::from_unix_timestamp(dt.secs()).ok())
                    .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
                results.push(FileInfo {
                    name: key.to_string(),
                    size: obj.size().unwrap_or(0) as u64,
                    last_modified,
                });
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

        let probe = async {
            self.client
                .list_buckets()
                .send()
                .await
                .map_err(map_s3_operation_error)?;
            Ok(())
        };

        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
    }
}

/// Streaming upload for the S3 backend using multipart upload.
///
/// Buffers incoming data to meet S3's 5 MB minimum part size requirement;
/// the final part may be any size.
struct S3Upload {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<aws_sdk_s3::types::CompletedPart>,
    part_number: i32,
    bytes_written: u64,
    buffer: Vec<u8>,
}

impl S3Upload {
    async fn upload_part(&mut self, data: Bytes) -> StorageResult<()> {
        let upload_output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .part_number(self.part_number)
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        let completed_part = aws_sdk_s3::types::CompletedPart::builder()
            .e_tag(upload_output.e_tag().unwrap_or_default())
            .part_number(self.part_number)
            .build();

        self.parts.push(completed_part);
        self.part_number += 1;

        Ok(())
    }

    async fn abort_upload(&self) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
        {
            tracing::warn!(
                key = %self.key,
                upload_id = %self.upload_id,
                error = %e,
                "failed to abort multipart upload, orphaned parts may remain"
            );
        }
    }
}

#[async_trait]
impl StreamingUpload for S3Upload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.bytes_written += data.len() as u64;
        self.buffer.extend_from_slice(&data);

        while self.buffer.len() >= MIN_PART_SIZE {
            let part_data: Vec<u8> = self.buffer.drain(..MIN_PART_SIZE).collect();
            self.upload_part(Bytes::from(part_data)).await?;
        }

        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if !self.buffer.is_empty() {
            let remainder = Bytes::from(std::mem::take(&mut self.buffer));
            self.upload_part(remainder).await?;
        }

        // Zero-byte uploads: multipart requires at least one part, so fall
        // back to a plain PutObject for empty objects.
        if self.parts.is_empty() {
            self.abort_upload().await;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(Bytes::new().into())
                .send()
                .await
                .map_err(map_s3_operation_error)?;
            return Ok(self.bytes_written);
        }

        let completed = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.abort_upload().await;
        Ok(())
    }
}
