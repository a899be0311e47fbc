//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File server (gRPC) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the gRPC listener (e.g., "0.0.0.0:50051").
    #[serde(default = "default_grpc_bind")]
    pub bind: String,
}

fn default_grpc_bind() -> String {
    "127.0.0.1:50051".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_grpc_bind(),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage. Each namespace maps to a directory
    /// under `path`.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage. Each namespace maps to a bucket, so the
    /// credentials must be allowed to create buckets.
    S3 {
        /// Endpoint URL (e.g., "http://localhost:9000" for MinIO).
        endpoint: String,
        /// Region to send in requests. Most S3-compatible services accept
        /// any value here.
        #[serde(default = "default_s3_region")]
        region: String,
        /// Access key ID.
        /// WARNING: Prefer env vars over storing secrets in config files.
        access_key_id: Option<String>,
        /// Secret access key.
        /// WARNING: Prefer env vars over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key` instead of
        /// `bucket.endpoint/key`). Required for MinIO and most
        /// S3-compatible services. Defaults to true.
        #[serde(default = "default_force_path_style")]
        force_path_style: bool,
    },
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { .. } => Ok(()),
            StorageConfig::S3 {
                endpoint,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if endpoint.is_empty() {
                    return Err("s3 config requires a non-empty endpoint".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key".to_string(),
                    ),
                }
            }
        }
    }
}

/// Complete file server configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// gRPC server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Create a test configuration with filesystem storage rooted at `path`.
    ///
    /// **For testing only.**
    pub fn for_testing(path: PathBuf) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem { path },
        }
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()
    }
}

/// HTTP gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address for the HTTP listener (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_bind")]
    pub bind: String,
    /// File service endpoint (e.g., "http://127.0.0.1:50051").
    #[serde(default = "default_file_service_url")]
    pub file_service_url: String,
    /// Auth service endpoint used for token validation.
    #[serde(default = "default_auth_service_url")]
    pub auth_service_url: String,
    /// Timeout in milliseconds for token validation calls.
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_file_service_url() -> String {
    "http://127.0.0.1:50051".to_string()
}

fn default_auth_service_url() -> String {
    "http://127.0.0.1:50052".to_string()
}

fn default_auth_timeout_ms() -> u64 {
    1000
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            file_service_url: default_file_service_url(),
            auth_service_url: default_auth_service_url(),
            auth_timeout_ms: default_auth_timeout_ms(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Get the token validation timeout as a Duration.
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_config_defaults_to_filesystem() {
        match StorageConfig::default() {
            StorageConfig::Filesystem { path } => {
                assert_eq!(path, PathBuf::from("./data/storage"));
            }
            _ => panic!("expected filesystem config"),
        }
    }

    #[test]
    fn s3_config_requires_credential_pair() {
        let missing_secret = StorageConfig::S3 {
            endpoint: "http://localhost:9000".to_string(),
            region: default_s3_region(),
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: true,
        };
        assert!(missing_secret.validate().is_err());

        let complete = StorageConfig::S3 {
            endpoint: "http://localhost:9000".to_string(),
            region: default_s3_region(),
            access_key_id: Some("access-key".to_string()),
            secret_access_key: Some("secret-key".to_string()),
            force_path_style: true,
        };
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn s3_config_force_path_style_defaults_to_true() {
        let json = r#"{
            "type": "s3",
            "endpoint": "http://localhost:9000",
            "access_key_id": "access-key",
            "secret_access_key": "secret-key"
        }"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        match config {
            StorageConfig::S3 {
                force_path_style,
                region,
                ..
            } => {
                assert!(force_path_style);
                assert_eq!(region, "us-east-1");
            }
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.auth_timeout(), Duration::from_millis(1000));
        assert_eq!(config.max_upload_bytes, 1024 * 1024 * 1024);
    }
}
