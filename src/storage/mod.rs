//! Object storage for processed images
//!
//! `StorageUploader` names the object, writes it through an [`ObjectStorage`]
//! implementation and works out the URL handed back to the caller.

pub mod memory;
pub mod s3;

use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

/// Content type of every stored cutout
pub const PNG_CONTENT_TYPE: &str = "image/png";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(
        "Storage not configured: set BUCKET (or RAILWAY_BUCKET_NAME), ACCESS_KEY_ID, SECRET_ACCESS_KEY."
    )]
    NotConfigured,

    #[error("Storage upload error: {0}")]
    Upload(String),

    #[error("Storage error: {0}")]
    Presign(String),

    #[error("Storage error: {0}")]
    Client(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal object store surface needed for publishing cutouts
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` under `key` with the given content type
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Time-limited GET URL for `key`
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

/// Object key `bg-removed-<12 hex>-<UTC YYYYMMDDHHMMSS>.png`
#[must_use]
pub fn generate_object_key() -> String {
    let id = Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    format!("bg-removed-{}-{timestamp}.png", &id[..12])
}

/// Publishes processed images and resolves their access URL
pub struct StorageUploader {
    config: StorageConfig,
    client: Option<Arc<dyn ObjectStorage>>,
}

impl std::fmt::Debug for StorageUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageUploader")
            .field("bucket", &self.config.bucket)
            .field("region", &self.config.effective_region())
            .field("endpoint", &self.config.endpoint)
            .field("public_base_url", &self.config.public_base_url)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

impl StorageUploader {
    /// Build an uploader backed by S3
    ///
    /// With incomplete credentials no client is created and every upload
    /// fails with [`StorageError::NotConfigured`].
    ///
    /// # Errors
    /// - The S3 client rejects the settings
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let client: Option<Arc<dyn ObjectStorage>> = if config.is_complete() {
            Some(Arc::new(S3Storage::new(&config)?))
        } else {
            tracing::warn!(
                "Object storage is not configured; uploads will fail until BUCKET, ACCESS_KEY_ID and SECRET_ACCESS_KEY are set"
            );
            None
        };

        Ok(Self { config, client })
    }

    /// Build an uploader over an existing storage client
    #[must_use]
    pub fn with_client(config: StorageConfig, client: Arc<dyn ObjectStorage>) -> Self {
        Self {
            config,
            client: Some(client),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Store `data` under a fresh key and return its access URL
    ///
    /// URL policy, first match wins:
    /// 1. public base URL configured: `{base}/{key}`
    /// 2. custom endpoint configured (private bucket): presigned GET URL
    /// 3. otherwise: `https://{bucket}.s3.{region}.amazonaws.com/{key}`
    ///
    /// # Errors
    /// - `NotConfigured` before any network call when credentials are missing
    /// - `Upload` when the provider rejects the write
    /// - `Presign` when URL signing fails
    pub async fn upload(&self, data: Bytes, content_type: &str) -> StorageResult<String> {
        if !self.config.is_complete() {
            return Err(StorageError::NotConfigured);
        }
        let (Some(bucket), Some(client)) = (self.config.bucket.as_deref(), self.client.as_ref())
        else {
            return Err(StorageError::NotConfigured);
        };

        let key = generate_object_key();
        let size = data.len();
        let start = Instant::now();

        client
            .put_object(&key, data, content_type)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    "Upload to bucket failed"
                );
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Uploaded processed image"
        );

        if let Some(base) = self.config.public_base_url.as_deref() {
            return Ok(format!("{}/{key}", base.trim_end_matches('/')));
        }

        if self.config.endpoint.is_some() {
            let expires_in = self.config.effective_presigned_expiry();
            return client
                .presigned_get_url(&key, expires_in)
                .await
                .inspect_err(|e| {
                    tracing::error!(error = %e, key = %key, "Failed to generate presigned URL");
                });
        }

        Ok(format!(
            "https://{bucket}.s3.{}.amazonaws.com/{key}",
            self.config.effective_region()
        ))
    }
}
