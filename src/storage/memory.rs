//! In-process storage used by tests and local runs

use super::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, GetOptions, ObjectStore, PutOptions, PutPayload};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Object storage held in memory
///
/// Presigned URLs use a `memory://` scheme and are counted so callers can
/// assert whether signing happened.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: InMemory,
    puts: AtomicUsize,
    presigns: AtomicUsize,
    fail_puts: AtomicBool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn presign_count(&self) -> usize {
        self.presigns.load(Ordering::SeqCst)
    }

    /// Read back a stored object and its content type
    pub async fn get(&self, key: &str) -> Option<(Bytes, Option<String>)> {
        let result = self
            .store
            .get_opts(&Path::from(key), GetOptions::default())
            .await
            .ok()?;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_string());
        let data = result.bytes().await.ok()?;
        Some((data, content_type))
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Upload("simulated write failure".to_string()));
        }

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&Path::from(key), PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.presigns.fetch_add(1, Ordering::SeqCst);
        Ok(format!("memory:///{key}?expires={}", expires_in.as_secs()))
    }
}
