use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// Default signed-URL lifetime.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Pluggable object storage backend for file attachments.
///
/// Keys are opaque strings chosen by the caller; the attachment mapper
/// namespaces them by category folder and a per-process monotonic timestamp,
/// so the bucket is append-only from this system's perspective.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store an object under `key`, overwriting any previous object.
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), BlobError>;

    /// Generate a time-limited URL for fetching the object.
    ///
    /// URLs are generated on read and never persisted.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;

    /// Delete an object. Returns `true` if the object existed.
    async fn delete(&self, key: &str) -> Result<bool, BlobError>;
}
