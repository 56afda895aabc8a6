//! ReportRegistry: ordered collection of report records

use super::record::{FileMeta, ReportId, ReportRecord};
use crate::storage::{KeyValueStore, StorageResult, REPORTS_KEY};
use std::sync::{Arc, PoisonError, RwLock};

/// Report records in upload order, written through to the backing store
///
/// Every mutation re-serializes the whole collection under
/// [`REPORTS_KEY`]. An empty collection removes the key.
#[derive(Default)]
pub struct ReportRegistry {
    reports: RwLock<Vec<ReportRecord>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl ReportRegistry {
    /// Create a registry with no persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that persists to the given store
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            store: Some(store),
        }
    }

    /// Replace in-memory state with what the backing store holds.
    ///
    /// Returns the number of records loaded.
    pub fn load(&self) -> StorageResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let loaded: Vec<ReportRecord> = match store.get(REPORTS_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let count = loaded.len();
        *self.reports.write().unwrap_or_else(PoisonError::into_inner) = loaded;
        Ok(count)
    }

    /// Register a new, unprocessed report and return its ID
    pub fn add(&self, meta: FileMeta) -> StorageResult<ReportId> {
        let record = ReportRecord::new(meta);
        let id = record.id.clone();
        self.mutate(|reports| {
            reports.push(record);
            true
        })?;
        Ok(id)
    }

    /// Get a report by ID
    pub fn get(&self, id: &ReportId) -> Option<ReportRecord> {
        self.read().iter().find(|r| &r.id == id).cloned()
    }

    /// All reports in upload order
    pub fn list(&self) -> Vec<ReportRecord> {
        self.read().clone()
    }

    pub fn contains(&self, id: &ReportId) -> bool {
        self.read().iter().any(|r| &r.id == id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove a report, returning it if it existed
    pub fn remove(&self, id: &ReportId) -> StorageResult<Option<ReportRecord>> {
        let mut removed = None;
        self.mutate(|reports| {
            if let Some(pos) = reports.iter().position(|r| &r.id == id) {
                removed = Some(reports.remove(pos));
                true
            } else {
                false
            }
        })?;
        Ok(removed)
    }

    /// Set the `processed` flag. Unknown IDs are ignored.
    ///
    /// Returns whether anything changed.
    pub fn set_processed(&self, id: &ReportId, processed: bool) -> StorageResult<bool> {
        self.update(id, |r| {
            let changed = r.processed != processed;
            r.processed = processed;
            changed
        })
    }

    /// Set the `processing` flag. Unknown IDs are ignored.
    ///
    /// Returns whether anything changed.
    pub fn set_processing(&self, id: &ReportId, processing: bool) -> StorageResult<bool> {
        self.update(id, |r| {
            let changed = r.processing != processing;
            r.processing = processing;
            changed
        })
    }

    /// Set both lifecycle flags in a single write
    pub(crate) fn set_flags(
        &self,
        id: &ReportId,
        processed: bool,
        processing: bool,
    ) -> StorageResult<bool> {
        self.update(id, |r| {
            let changed = r.processed != processed || r.processing != processing;
            r.processed = processed;
            r.processing = processing;
            changed
        })
    }

    /// Put back a snapshot taken with [`ReportRegistry::list`]
    pub(crate) fn restore(&self, snapshot: Vec<ReportRecord>) -> StorageResult<()> {
        self.mutate(|reports| {
            *reports = snapshot;
            true
        })
    }

    /// Drop every report
    pub fn clear(&self) -> StorageResult<()> {
        self.mutate(|reports| {
            let had_any = !reports.is_empty();
            reports.clear();
            had_any
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ReportRecord>> {
        self.reports.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(
        &self,
        id: &ReportId,
        apply: impl FnOnce(&mut ReportRecord) -> bool,
    ) -> StorageResult<bool> {
        let mut changed = false;
        self.mutate(|reports| {
            if let Some(record) = reports.iter_mut().find(|r| &r.id == id) {
                changed = apply(record);
            }
            changed
        })?;
        Ok(changed)
    }

    /// Apply a mutation to a copy, persist the copy, then commit it.
    ///
    /// The lock is held across the write so persisted snapshots land in
    /// mutation order. A failed write leaves memory untouched.
    fn mutate(&self, apply: impl FnOnce(&mut Vec<ReportRecord>) -> bool) -> StorageResult<()> {
        let mut reports = self.reports.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = reports.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *reports = next;
        Ok(())
    }

    fn persist(&self, reports: &[ReportRecord]) -> StorageResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if reports.is_empty() {
            store.remove(REPORTS_KEY)?;
            tracing::debug!("Cleared persisted reports");
        } else {
            let json = serde_json::to_string(reports)?;
            store.set(REPORTS_KEY, &json)?;
            tracing::debug!("Persisted {} reports", reports.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FailingStore, MemoryStore};

    fn meta(name: &str) -> FileMeta {
        FileMeta::new(name, 2048, "application/pdf", 1000)
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let registry = ReportRegistry::new();
        let a = registry.add(meta("a.pdf")).unwrap();
        let b = registry.add(meta("b.pdf")).unwrap();

        let ids: Vec<ReportId> = registry.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_flag_setters_ignore_unknown_ids() {
        let registry = ReportRegistry::new();
        registry.add(meta("a.pdf")).unwrap();

        let changed = registry
            .set_processing(&ReportId::from("missing"), true)
            .unwrap();
        assert!(!changed);
        assert!(registry.list().iter().all(|r| !r.processing));
    }

    #[test]
    fn test_set_processed_is_idempotent() {
        let registry = ReportRegistry::new();
        let id = registry.add(meta("a.pdf")).unwrap();

        assert!(registry.set_processed(&id, true).unwrap());
        let after_first = registry.get(&id).unwrap();
        assert!(!registry.set_processed(&id, true).unwrap());
        assert_eq!(registry.get(&id).unwrap(), after_first);
    }

    #[test]
    fn test_persist_and_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = ReportRegistry::with_store(store.clone());
        let id = registry.add(meta("Q1.pdf")).unwrap();
        registry.set_processing(&id, true).unwrap();
        let original = registry.list();

        let reloaded = ReportRegistry::with_store(store);
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.list(), original);
    }

    #[test]
    fn test_removing_last_report_clears_key() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = ReportRegistry::with_store(store.clone());
        let id = registry.add(meta("a.pdf")).unwrap();
        assert!(store.get(REPORTS_KEY).unwrap().is_some());

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.map(|r| r.id), Some(id));
        assert!(store.get(REPORTS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(REPORTS_KEY, "{not json").unwrap();

        let registry = ReportRegistry::with_store(store);
        assert!(registry.load().is_err());
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        let store = Arc::new(FailingStore::default());
        let registry = ReportRegistry::with_store(store.clone());
        let id = registry.add(meta("a.pdf")).unwrap();
        store.fail_writes(REPORTS_KEY);

        assert!(registry.set_processing(&id, true).is_err());
        assert!(registry.add(meta("b.pdf")).is_err());
        assert!(registry.remove(&id).is_err());

        assert_eq!(registry.len(), 1);
        assert!(!registry.get(&id).unwrap().processing);
    }
}
