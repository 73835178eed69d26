use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use laporan_blob::error::BlobError;
use laporan_blob::store::FileStore;

/// A single stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    data: Bytes,
}

/// In-memory [`FileStore`] backed by a [`DashMap`].
///
/// Signed URLs are synthetic (`memory://{key}?expires_in={secs}`) but stable
/// enough for tests to assert on. This backend is fully synchronous
/// internally; the async trait methods return immediately.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryFileStore {
    /// Create a new, empty in-memory file store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether an object exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// All stored keys, unordered. Test helper.
    pub fn keys(&self) -> Vec<String> {
        self.objects.iter().map(|e| e.key().clone()).collect()
    }

    /// Raw bytes stored under `key`, if any. Test helper.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|o| o.data.clone())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), BlobError> {
        self.objects.insert(
            key.to_owned(),
            StoredObject {
                content_type: content_type.to_owned(),
                data,
            },
        );
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        if !self.objects.contains_key(key) {
            return Err(BlobError::NotFound(key.to_owned()));
        }
        Ok(format!("memory://{key}?expires_in={}", ttl.as_secs()))
    }

    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.objects.remove(key).is_some())
    }
}
