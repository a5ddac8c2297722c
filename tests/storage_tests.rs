//! Upload and URL policy tests against in-memory storage

mod common;

use bgremove_api::storage::{MemoryStorage, StorageError, StorageUploader, PNG_CONTENT_TYPE};
use bgremove_api::StorageConfig;
use bytes::Bytes;
use common::storage_config;
use std::sync::Arc;
use std::time::Duration;

fn uploader(config: StorageConfig) -> (StorageUploader, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (StorageUploader::with_client(config, storage.clone()), storage)
}

fn key_of(url: &str) -> &str {
    let path = url.split('?').next().unwrap();
    path.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn test_public_base_url_skips_signing() {
    let (uploader, storage) = uploader(storage_config(
        Some("https://cdn.example.com///"),
        Some("https://account.r2.cloudflarestorage.com"),
    ));

    let url = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    assert!(url.starts_with("https://cdn.example.com/bg-removed-"));
    assert!(!url.contains("com//"));
    assert_eq!(storage.presign_count(), 0);
    assert_eq!(storage.put_count(), 1);

    let (data, content_type) = storage.get(key_of(&url)).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"png"));
    assert_eq!(content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_custom_endpoint_presigns() {
    let mut config = storage_config(None, Some("https://minio.internal:9000"));
    config.presigned_expiry = Duration::from_secs(600);
    let (uploader, storage) = uploader(config);

    let url = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    assert!(url.starts_with("memory:///bg-removed-"));
    assert!(url.ends_with("?expires=600"));
    assert_eq!(storage.presign_count(), 1);
}

#[tokio::test]
async fn test_aws_url_without_endpoint() {
    let (uploader, storage) = uploader(storage_config(None, None));

    let url = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    let key = url
        .strip_prefix("https://images.s3.eu-west-1.amazonaws.com/")
        .unwrap();
    assert!(key.starts_with("bg-removed-") && key.ends_with(".png"));
    assert_eq!(storage.presign_count(), 0);
}

#[tokio::test]
async fn test_auto_region_uses_default() {
    let mut config = storage_config(None, None);
    config.region = Some("auto".to_string());
    let (uploader, _storage) = uploader(config);

    let url = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    assert!(url.starts_with("https://images.s3.us-east-1.amazonaws.com/"));
}

#[tokio::test]
async fn test_keys_are_unique_across_uploads() {
    let (uploader, storage) = uploader(storage_config(Some("https://cdn.example.com"), None));

    let first = uploader
        .upload(Bytes::from_static(b"a"), PNG_CONTENT_TYPE)
        .await
        .unwrap();
    let second = uploader
        .upload(Bytes::from_static(b"b"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(storage.put_count(), 2);
    assert_eq!(
        storage.get(key_of(&first)).await.unwrap().0,
        Bytes::from_static(b"a")
    );
}

#[tokio::test]
async fn test_missing_credentials_fail_before_any_write() {
    for strip in ["bucket", "access_key_id", "secret_access_key"] {
        let mut config = storage_config(Some("https://cdn.example.com"), None);
        match strip {
            "bucket" => config.bucket = None,
            "access_key_id" => config.access_key_id = None,
            _ => config.secret_access_key = None,
        }
        let (uploader, storage) = uploader(config);

        let err = uploader
            .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotConfigured), "{strip}");
        assert_eq!(storage.put_count(), 0);
    }
}

#[tokio::test]
async fn test_write_failure_skips_url() {
    let (uploader, storage) = uploader(storage_config(None, Some("https://minio.internal")));
    storage.fail_puts(true);

    let err = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Upload(_)));
    assert_eq!(storage.presign_count(), 0);
}

#[tokio::test]
async fn test_s3_uploader_without_credentials() {
    let uploader = StorageUploader::new(StorageConfig::default()).unwrap();

    let err = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotConfigured));
}

#[tokio::test]
async fn test_default_expiry_applies_to_presigned_urls() {
    let config = StorageConfig {
        bucket: Some("images".to_string()),
        access_key_id: Some("AKIDEXAMPLE".to_string()),
        secret_access_key: Some("secret".to_string()),
        endpoint: Some("https://minio.internal:9000".to_string()),
        ..StorageConfig::default()
    };
    let (uploader, _storage) = uploader(config);

    let url = uploader
        .upload(Bytes::from_static(b"png"), PNG_CONTENT_TYPE)
        .await
        .unwrap();

    assert!(url.ends_with("?expires=604800"), "{url}");
}
