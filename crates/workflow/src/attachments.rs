use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, warn};

use laporan_blob::store::{DEFAULT_URL_TTL, FileStore};
use laporan_core::{Attachment, AttachmentView, FileCategory};

use crate::error::WorkflowError;

/// How many uploads run concurrently within one batch.
const DEFAULT_UPLOAD_WIDTH: usize = 4;

/// A raw uploaded file as handed over by the presentation layer.
#[derive(Debug, Clone)]
pub struct RawUpload {
    /// Original filename.
    pub name: String,
    /// MIME content type.
    pub content_type: String,
    /// Multipart field name the file arrived under.
    pub field_name: String,
    /// Transfer encoding reported at upload time.
    pub encoding: String,
    /// File content.
    pub data: Bytes,
}

impl RawUpload {
    /// Build an upload with the usual multipart defaults for field name and
    /// encoding.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            field_name: "file".into(),
            encoding: "7bit".into(),
            data,
        }
    }

    /// Override the multipart field name.
    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }
}

/// Raw uploads for both attachment categories of one operation.
#[derive(Debug, Clone, Default)]
pub struct UploadSet {
    pub need_approve: Vec<RawUpload>,
    pub no_need_approve: Vec<RawUpload>,
}

impl UploadSet {
    /// No files in either category.
    pub fn is_empty(&self) -> bool {
        self.need_approve.is_empty() && self.no_need_approve.is_empty()
    }
}

/// Converts raw uploads into persisted [`Attachment`] records and back into
/// URL-bearing views.
///
/// Storage keys are `{category-folder}/{timestamp_ms}-{name}` with a
/// per-process strictly increasing timestamp, so concurrent batches never
/// collide and ties break by insertion order.
pub struct AttachmentMapper {
    store: Arc<dyn FileStore>,
    url_ttl: Duration,
    upload_width: usize,
    last_timestamp: AtomicI64,
}

impl AttachmentMapper {
    /// Create a mapper with the default URL TTL and upload concurrency.
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            url_ttl: DEFAULT_URL_TTL,
            upload_width: DEFAULT_UPLOAD_WIDTH,
            last_timestamp: AtomicI64::new(0),
        }
    }

    /// Set the signed-URL lifetime used by [`Self::to_view`].
    #[must_use]
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    /// Set the concurrent upload width for batches.
    #[must_use]
    pub fn with_upload_width(mut self, width: usize) -> Self {
        self.upload_width = width.max(1);
        self
    }

    /// Next key timestamp: `max(now, last + 1)`, strictly increasing even if
    /// the clock stalls or steps backwards.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let result =
            self.last_timestamp
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                    Some(last.max(now - 1) + 1)
                });
        match result {
            Ok(prev) | Err(prev) => prev.max(now - 1) + 1,
        }
    }

    fn derive_key(&self, category: FileCategory, name: &str) -> String {
        format!("{}/{}-{name}", category.folder(), self.next_timestamp())
    }

    /// Upload a batch of files for one category, all-or-nothing.
    ///
    /// Uploads run concurrently (bounded width, output order matches input
    /// order). If any upload fails, every key that did land in this batch is
    /// deleted best-effort before the error is returned.
    pub async fn store_batch(
        &self,
        files: Vec<RawUpload>,
        category: FileCategory,
    ) -> Result<Vec<Attachment>, WorkflowError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        // Keys are allocated up front, in input order, so insertion order
        // decides timestamp ties.
        let keyed: Vec<(RawUpload, String)> = files
            .into_iter()
            .map(|file| {
                let key = self.derive_key(category, &file.name);
                (file, key)
            })
            .collect();

        let results: Vec<(usize, Result<(), laporan_blob::BlobError>)> =
            futures::stream::iter(keyed.iter().enumerate().map(|(idx, (file, key))| {
                let store = Arc::clone(&self.store);
                async move {
                    let outcome = store.put(key, &file.content_type, file.data.clone()).await;
                    (idx, outcome)
                }
            }))
            .buffered(self.upload_width)
            .collect()
            .await;

        let mut uploaded_keys = Vec::new();
        let mut first_error = None;
        for (idx, outcome) in results {
            match outcome {
                Ok(()) => uploaded_keys.push(keyed[idx].1.clone()),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(_) => {}
            }
        }

        if let Some(err) = first_error {
            warn!(
                category = %category,
                uploaded = uploaded_keys.len(),
                error = %err,
                "batch upload failed; removing partial uploads"
            );
            self.delete_keys(&uploaded_keys).await;
            return Err(err.into());
        }

        let attachments = keyed
            .into_iter()
            .map(|(file, key)| Attachment {
                name: file.name,
                key,
                size_bytes: file.data.len() as u64,
                content_type: file.content_type,
                field_name: file.field_name,
                encoding: file.encoding,
            })
            .collect();
        Ok(attachments)
    }

    /// Decorate one stored attachment with a freshly signed URL.
    pub async fn to_view(&self, attachment: &Attachment) -> Result<AttachmentView, WorkflowError> {
        let url = self.store.signed_url(&attachment.key, self.url_ttl).await?;
        Ok(AttachmentView {
            attachment: attachment.clone(),
            url,
        })
    }

    /// Decorate a whole sequence, preserving order.
    pub async fn to_views(
        &self,
        attachments: &[Attachment],
    ) -> Result<Vec<AttachmentView>, WorkflowError> {
        let mut views = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            views.push(self.to_view(attachment).await?);
        }
        Ok(views)
    }

    /// Best-effort delete of stored attachments, logging and continuing on
    /// individual failures. Returns how many deletes succeeded.
    pub async fn delete_all(&self, attachments: &[Attachment]) -> usize {
        let keys: Vec<String> = attachments.iter().map(|a| a.key.clone()).collect();
        self.delete_keys(&keys).await
    }

    /// Best-effort delete by key. Returns how many deletes succeeded.
    pub(crate) async fn delete_keys(&self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            match self.store.delete(key).await {
                Ok(_) => {
                    debug!(key = %key, "deleted stored object");
                    removed += 1;
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to delete stored object");
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laporan_blob_memory::MemoryFileStore;

    fn mapper(store: Arc<MemoryFileStore>) -> AttachmentMapper {
        AttachmentMapper::new(store)
    }

    #[tokio::test]
    async fn batch_preserves_input_order_and_names_keys_by_category() {
        let store = Arc::new(MemoryFileStore::new());
        let mapper = mapper(Arc::clone(&store));

        let files = vec![
            RawUpload::new("first.pdf", "application/pdf", Bytes::from("1")),
            RawUpload::new("second.pdf", "application/pdf", Bytes::from("2")),
            RawUpload::new("third.pdf", "application/pdf", Bytes::from("3")),
        ];
        let attachments = mapper
            .store_batch(files, FileCategory::NeedApprove)
            .await
            .unwrap();

        assert_eq!(attachments.len(), 3);
        assert_eq!(attachments[0].name, "first.pdf");
        assert_eq!(attachments[1].name, "second.pdf");
        assert_eq!(attachments[2].name, "third.pdf");
        for attachment in &attachments {
            assert!(attachment.key.starts_with("need-approve/"));
            assert!(store.contains(&attachment.key));
        }
    }

    #[tokio::test]
    async fn key_timestamps_are_strictly_increasing() {
        let store = Arc::new(MemoryFileStore::new());
        let mapper = mapper(store);
        let mut last = 0;
        for _ in 0..100 {
            let ts = mapper.next_timestamp();
            assert!(ts > last, "timestamps must strictly increase");
            last = ts;
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = Arc::new(MemoryFileStore::new());
        let mapper = mapper(Arc::clone(&store));
        let attachments = mapper
            .store_batch(Vec::new(), FileCategory::NoNeedApprove)
            .await
            .unwrap();
        assert!(attachments.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn to_view_signs_a_fresh_url() {
        let store = Arc::new(MemoryFileStore::new());
        let mapper = mapper(Arc::clone(&store));
        let attachments = mapper
            .store_batch(
                vec![RawUpload::new("a.txt", "text/plain", Bytes::from("a"))],
                FileCategory::NoNeedApprove,
            )
            .await
            .unwrap();
        let view = mapper.to_view(&attachments[0]).await.unwrap();
        assert!(view.url.starts_with("memory://no-need-approve/"));
        assert!(view.url.ends_with("expires_in=3600"));
    }

    #[tokio::test]
    async fn delete_all_removes_every_key() {
        let store = Arc::new(MemoryFileStore::new());
        let mapper = mapper(Arc::clone(&store));
        let attachments = mapper
            .store_batch(
                vec![
                    RawUpload::new("a.txt", "text/plain", Bytes::from("a")),
                    RawUpload::new("b.txt", "text/plain", Bytes::from("b")),
                ],
                FileCategory::NeedApprove,
            )
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        let removed = mapper.delete_all(&attachments).await;
        assert_eq!(removed, 2);
        assert!(store.is_empty());
    }
}
