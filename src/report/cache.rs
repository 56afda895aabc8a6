//! ExtractedDataCache: one extracted-data bundle per report

use super::extracted::ExtractedDataRecord;
use super::record::ReportId;
use crate::storage::{KeyValueStore, StorageResult, EXTRACTED_DATA_KEY};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Extracted data keyed by report ID, written through to the backing store
///
/// Persisted as a JSON object under [`EXTRACTED_DATA_KEY`].
#[derive(Default)]
pub struct ExtractedDataCache {
    entries: DashMap<ReportId, ExtractedDataRecord>,
    store: Option<Arc<dyn KeyValueStore>>,
    /// Serializes mutate-then-persist so snapshots land in order
    persist_lock: Mutex<()>,
}

impl ExtractedDataCache {
    /// Create a cache with no persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that persists to the given store
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store: Some(store),
            ..Default::default()
        }
    }

    /// Replace in-memory state with what the backing store holds.
    pub fn load(&self) -> StorageResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let loaded: HashMap<ReportId, ExtractedDataRecord> = match store.get(EXTRACTED_DATA_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => HashMap::new(),
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries.clear();
        let count = loaded.len();
        for (report_id, record) in loaded {
            self.entries.insert(report_id, record);
        }
        Ok(count)
    }

    /// Insert or replace the bundle for `record.report_id`
    pub fn insert(&self, record: ExtractedDataRecord) -> StorageResult<()> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.snapshot();
        next.insert(record.report_id.clone(), record.clone());
        self.persist(&next)?;
        self.entries.insert(record.report_id.clone(), record);
        Ok(())
    }

    /// Get the bundle for a report
    pub fn get(&self, report_id: &ReportId) -> Option<ExtractedDataRecord> {
        self.entries.get(report_id).map(|r| r.clone())
    }

    /// Remove the bundle for a report, returning it if present
    pub fn remove(&self, report_id: &ReportId) -> StorageResult<Option<ExtractedDataRecord>> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.entries.contains_key(report_id) {
            return Ok(None);
        }
        let mut next = self.snapshot();
        next.remove(report_id);
        self.persist(&next)?;
        Ok(self.entries.remove(report_id).map(|(_, record)| record))
    }

    /// Snapshot of every bundle, keyed by report ID
    pub fn all(&self) -> HashMap<ReportId, ExtractedDataRecord> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every bundle
    pub fn clear(&self) -> StorageResult<()> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.persist(&BTreeMap::new())?;
        self.entries.clear();
        Ok(())
    }

    /// Sorted copy of the entries; sorted keys keep the persisted document
    /// stable between writes
    fn snapshot(&self) -> BTreeMap<ReportId, ExtractedDataRecord> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Write `entries` as the whole collection. Caller holds `persist_lock`.
    fn persist(&self, entries: &BTreeMap<ReportId, ExtractedDataRecord>) -> StorageResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if entries.is_empty() {
            store.remove(EXTRACTED_DATA_KEY)?;
            tracing::debug!("Cleared persisted extracted data");
            return Ok(());
        }
        let json = serde_json::to_string(entries)?;
        store.set(EXTRACTED_DATA_KEY, &json)?;
        tracing::debug!("Persisted extracted data for {} reports", entries.len());
        Ok(())
    }
}
