use std::sync::Arc;
use std::time::Duration;

use laporan_blob::store::{DEFAULT_URL_TTL, FileStore};
use laporan_store::store::LaporanStore;

use crate::attachments::AttachmentMapper;
use crate::directory::UserDirectory;
use crate::engine::WorkflowEngine;
use crate::error::WorkflowError;

/// Assembles a [`WorkflowEngine`] from its injected collaborators.
///
/// A repository, a file store, and a user directory are required;
/// [`build`](Self::build) fails with [`WorkflowError::Configuration`] when
/// one is missing. URL lifetime and upload concurrency are optional knobs.
pub struct WorkflowEngineBuilder {
    store: Option<Arc<dyn LaporanStore>>,
    file_store: Option<Arc<dyn FileStore>>,
    directory: Option<Arc<dyn UserDirectory>>,
    url_ttl: Duration,
    upload_width: Option<usize>,
}

impl Default for WorkflowEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            file_store: None,
            directory: None,
            url_ttl: DEFAULT_URL_TTL,
            upload_width: None,
        }
    }

    /// Repository backing laporan records.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn LaporanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Object store backing attached files.
    #[must_use]
    pub fn file_store(mut self, file_store: Arc<dyn FileStore>) -> Self {
        self.file_store = Some(file_store);
        self
    }

    /// Directory used to validate `assign_to` references.
    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Lifetime of signed attachment URLs.
    #[must_use]
    pub fn url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    /// Concurrent upload width within one file batch.
    #[must_use]
    pub fn upload_width(mut self, width: usize) -> Self {
        self.upload_width = Some(width);
        self
    }

    pub fn build(self) -> Result<WorkflowEngine, WorkflowError> {
        let store = self
            .store
            .ok_or_else(|| WorkflowError::Configuration("a laporan store is required".into()))?;
        let file_store = self
            .file_store
            .ok_or_else(|| WorkflowError::Configuration("a file store is required".into()))?;
        let directory = self
            .directory
            .ok_or_else(|| WorkflowError::Configuration("a user directory is required".into()))?;

        let mut mapper = AttachmentMapper::new(file_store).with_url_ttl(self.url_ttl);
        if let Some(width) = self.upload_width {
            mapper = mapper.with_upload_width(width);
        }

        Ok(WorkflowEngine::from_parts(store, mapper, directory))
    }
}
