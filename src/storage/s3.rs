//! S3-compatible storage over `object_store`

use super::{ObjectStorage, StorageError, StorageResult};
use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::time::Duration;

/// Bucket client for AWS S3 and S3-compatible providers
#[derive(Debug, Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Build a client from explicit settings
    ///
    /// Credentials come only from the given config, never from the ambient
    /// AWS environment. A custom endpoint is used with path-style requests.
    ///
    /// # Errors
    /// - Missing bucket or credentials
    /// - Invalid endpoint
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let (Some(bucket), Some(access_key_id), Some(secret_access_key)) = (
            config.bucket.as_deref(),
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
        ) else {
            return Err(StorageError::NotConfigured);
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(config.effective_region())
            .with_access_key_id(access_key_id)
            .with_secret_access_key(secret_access_key);

        if let Some(endpoint) = config.endpoint.as_deref() {
            let endpoint = endpoint.trim_end_matches('/');
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"))
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        tracing::info!(
            bucket = %bucket,
            region = %config.effective_region(),
            endpoint = ?config.endpoint,
            "S3 storage client configured"
        );

        Ok(Self {
            store,
            bucket: bucket.to_string(),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let location = Path::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = Path::from(key);
        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>) -> StorageConfig {
        StorageConfig {
            bucket: Some("images".to_string()),
            region: Some("auto".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
            endpoint: endpoint.map(str::to_string),
            public_base_url: None,
            presigned_expiry: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_requires_credentials() {
        let incomplete = StorageConfig {
            secret_access_key: None,
            ..config(None)
        };
        assert!(matches!(
            S3Storage::new(&incomplete),
            Err(StorageError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_presigned_url_uses_custom_endpoint() {
        let storage = S3Storage::new(&config(Some("https://storage.example.com/"))).unwrap();
        assert_eq!(storage.bucket(), "images");

        let url = storage
            .presigned_get_url("bg-removed-abc.png", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("https://storage.example.com/images/bg-removed-abc.png?"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("us-east-1"));
    }
}
