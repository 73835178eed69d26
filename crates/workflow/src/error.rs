use thiserror::Error;

use laporan_blob::BlobError;
use laporan_store::StoreError;

/// Errors surfaced by workflow operations.
///
/// `NotFound`, `Validation`, `DomainRule`, and `Conflict` are
/// client-actionable; `Storage` and `Persistence` are server faults. Nothing
/// here retries automatically.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The referenced laporan or assigned user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A field failed validation before any state was touched.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested operation is illegal in the record's current state.
    #[error("domain rule violation: {0}")]
    DomainRule(String),

    /// The record changed under the caller; reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The engine was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An object storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] BlobError),

    /// The repository failed.
    #[error("persistence error: {0}")]
    Persistence(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            other => Self::Persistence(other),
        }
    }
}
