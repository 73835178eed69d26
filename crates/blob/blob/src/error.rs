use thiserror::Error;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A storage backend error occurred.
    #[error("object storage error: {0}")]
    Storage(String),
}
