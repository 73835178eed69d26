use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use laporan_core::{Laporan, LaporanFilter};
use laporan_store::error::StoreError;
use laporan_store::store::{LaporanStore, LaporanTxn};

#[derive(Debug, Default)]
struct Inner {
    records: DashMap<Uuid, Laporan>,
    // Serializes transaction commits so a commit's version checks and writes
    // are applied as one unit.
    commit_lock: Mutex<()>,
}

impl Inner {
    fn apply_save(&self, mut laporan: Laporan, expected: i64) -> Result<Laporan, StoreError> {
        match self.records.entry(laporan.id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().version != expected {
                    return Err(StoreError::Conflict {
                        id: laporan.id,
                        expected,
                    });
                }
                laporan.version = expected + 1;
                laporan.updated_at = Utc::now();
                occupied.insert(laporan.clone());
                Ok(laporan)
            }
            // A concurrently deleted row surfaces as a conflict, same as a
            // stale version.
            dashmap::mapref::entry::Entry::Vacant(_) => Err(StoreError::Conflict {
                id: laporan.id,
                expected,
            }),
        }
    }

    fn sorted_newest_first(&self, mut records: Vec<Laporan>) -> Vec<Laporan> {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }
}

/// In-memory [`LaporanStore`] backed by a [`DashMap`].
///
/// Saves are atomic per record through the map's shard locks; transaction
/// commits additionally serialize through a commit mutex so staged writes
/// land as one unit.
#[derive(Debug, Clone, Default)]
pub struct MemoryLaporanStore {
    inner: Arc<Inner>,
}

impl MemoryLaporanStore {
    /// Create a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Test helper.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Whether the repository is empty. Test helper.
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }
}

#[async_trait]
impl LaporanStore for MemoryLaporanStore {
    async fn insert(&self, laporan: Laporan) -> Result<Laporan, StoreError> {
        match self.inner.records.entry(laporan.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Backend(format!(
                "laporan {} already exists",
                laporan.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(laporan.clone());
                Ok(laporan)
            }
        }
    }

    async fn find(&self, id: Uuid) -> Result<Option<Laporan>, StoreError> {
        Ok(self.inner.records.get(&id).map(|r| r.clone()))
    }

    async fn find_all(&self) -> Result<Vec<Laporan>, StoreError> {
        let records: Vec<Laporan> = self.inner.records.iter().map(|r| r.clone()).collect();
        Ok(self.inner.sorted_newest_first(records))
    }

    async fn find_assigned(&self, user_id: Uuid) -> Result<Vec<Laporan>, StoreError> {
        let records: Vec<Laporan> = self
            .inner
            .records
            .iter()
            .filter(|r| r.assign_to == Some(user_id))
            .map(|r| r.clone())
            .collect();
        Ok(self.inner.sorted_newest_first(records))
    }

    async fn filter(&self, filter: &LaporanFilter) -> Result<Vec<Laporan>, StoreError> {
        let records: Vec<Laporan> = self
            .inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.clone())
            .collect();
        Ok(self.inner.sorted_newest_first(records))
    }

    async fn save(&self, laporan: Laporan) -> Result<Laporan, StoreError> {
        let expected = laporan.version;
        self.inner.apply_save(laporan, expected)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.records.remove(&id).is_some())
    }

    async fn begin(&self) -> Result<Box<dyn LaporanTxn>, StoreError> {
        Ok(Box::new(MemoryTxn {
            inner: Arc::clone(&self.inner),
            staged: Vec::new(),
        }))
    }
}

/// One staged write: the record as patched inside the transaction, plus the
/// version observed when it was staged.
#[derive(Debug)]
struct StagedSave {
    base_version: i64,
    record: Laporan,
}

struct MemoryTxn {
    inner: Arc<Inner>,
    staged: Vec<StagedSave>,
}

#[async_trait]
impl LaporanTxn for MemoryTxn {
    async fn find(&mut self, id: Uuid) -> Result<Option<Laporan>, StoreError> {
        if let Some(staged) = self.staged.iter().rev().find(|s| s.record.id == id) {
            return Ok(Some(staged.record.clone()));
        }
        Ok(self.inner.records.get(&id).map(|r| r.clone()))
    }

    async fn save(&mut self, laporan: Laporan) -> Result<Laporan, StoreError> {
        let base_version = laporan.version;
        // Replace any earlier staged write for the same record.
        self.staged.retain(|s| s.record.id != laporan.id);
        self.staged.push(StagedSave {
            base_version,
            record: laporan.clone(),
        });

        let mut preview = laporan;
        preview.version = base_version + 1;
        preview.updated_at = Utc::now();
        Ok(preview)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let inner = self.inner;
        let _guard = inner
            .commit_lock
            .lock()
            .map_err(|e| StoreError::Backend(format!("commit lock poisoned: {e}")))?;

        // Verify every staged version before touching the map, so a conflict
        // leaves the store exactly as it was.
        for staged in &self.staged {
            let current = inner.records.get(&staged.record.id);
            match current {
                Some(record) if record.version == staged.base_version => {}
                _ => {
                    return Err(StoreError::Conflict {
                        id: staged.record.id,
                        expected: staged.base_version,
                    });
                }
            }
        }

        for staged in self.staged {
            inner.apply_save(staged.record, staged.base_version)?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Nothing was applied; dropping the staged writes is enough.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laporan_store::testing;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryLaporanStore::new();
        testing::run_store_conformance_tests(&store)
            .await
            .expect("memory store should pass conformance");
    }

    #[tokio::test]
    async fn clones_share_the_same_records() {
        let store = MemoryLaporanStore::new();
        let other = store.clone();
        let laporan = testing::sample_laporan(Utc::now());
        let id = laporan.id;
        store.insert(laporan).await.unwrap();
        assert!(other.find(id).await.unwrap().is_some());
    }
}
