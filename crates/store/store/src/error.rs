use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in a laporan repository backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write raced with another update (or a concurrent delete): the
    /// record's stored version no longer matches the version the caller
    /// loaded.
    #[error("version conflict on laporan {id}: expected version {expected}")]
    Conflict { id: Uuid, expected: i64 },

    /// Failed to reach the backend.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend reported an operational error.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}
