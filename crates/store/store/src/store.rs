use async_trait::async_trait;
use uuid::Uuid;

use laporan_core::{Laporan, LaporanFilter};

use crate::error::StoreError;

/// Repository over the laporan aggregate.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Every save enforces optimistic concurrency through the record's `version`
/// field, and all listing operations return records ordered by `created_at`
/// descending.
#[async_trait]
pub trait LaporanStore: Send + Sync {
    /// Persist a brand-new record. Fails if the id already exists.
    async fn insert(&self, laporan: Laporan) -> Result<Laporan, StoreError>;

    /// Fetch one record by id. Returns `None` if absent.
    async fn find(&self, id: Uuid) -> Result<Option<Laporan>, StoreError>;

    /// All records, newest first.
    async fn find_all(&self) -> Result<Vec<Laporan>, StoreError>;

    /// Records assigned to the given user, newest first.
    async fn find_assigned(&self, user_id: Uuid) -> Result<Vec<Laporan>, StoreError>;

    /// Records matching the filter's AND-composed predicates, newest first.
    async fn filter(&self, filter: &LaporanFilter) -> Result<Vec<Laporan>, StoreError>;

    /// Persist changes to an existing record.
    ///
    /// The stored version must equal `laporan.version`; on success the
    /// returned record carries `version + 1` and a refreshed `updated_at`.
    /// A stale version (or a concurrently deleted row) fails with
    /// [`StoreError::Conflict`].
    async fn save(&self, laporan: Laporan) -> Result<Laporan, StoreError>;

    /// Delete a record. Returns `true` if it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Open a unit of work scoped to single-record read-modify-write
    /// sequences. Nothing staged through the transaction is visible until
    /// `commit`; dropping without commit discards all staged writes.
    async fn begin(&self) -> Result<Box<dyn LaporanTxn>, StoreError>;
}

/// A transaction handle returned by [`LaporanStore::begin`].
#[async_trait]
pub trait LaporanTxn: Send {
    /// Fetch one record, observing writes staged earlier in this transaction.
    async fn find(&mut self, id: Uuid) -> Result<Option<Laporan>, StoreError>;

    /// Stage a save with the same version semantics as
    /// [`LaporanStore::save`].
    async fn save(&mut self, laporan: Laporan) -> Result<Laporan, StoreError>;

    /// Make all staged writes durable and visible.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all staged writes.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
