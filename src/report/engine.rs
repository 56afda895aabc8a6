//! ReportStore: the single entry point over reports, extracted data and session

use super::cache::ExtractedDataCache;
use super::extracted::ExtractedDataRecord;
use super::purge::{PurgeTimer, DEFAULT_PURGE_DELAY};
use super::record::{FileMeta, ReportId, ReportRecord};
use super::registry::ReportRegistry;
use super::session::SessionState;
use super::user::UserIdentity;
use crate::storage::{KeyValueStore, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Extracted data references unknown report: {0}")]
    DanglingReference(ReportId),

    #[error("Report not found: {0}")]
    ReportNotFound(ReportId),

    #[error("Report already processed: {0}")]
    AlreadyProcessed(ReportId),

    #[error("Report is already being processed: {0}")]
    AlreadyProcessing(ReportId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The report store
///
/// Owns the report registry, the extracted-data cache and the session
/// state, all persisted through one injected [`KeyValueStore`]. Writes are
/// serialized so that multi-part updates (attaching data and flipping the
/// report's flags, removing a report and its data, purging) are atomic to
/// other writers.
pub struct ReportStore {
    registry: Arc<ReportRegistry>,
    cache: Arc<ExtractedDataCache>,
    session: Arc<SessionState>,
    writer: Arc<Mutex<()>>,
    purge: PurgeTimer,
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore {
    /// Create a store with no persistence
    pub fn new() -> Self {
        Self::from_parts(
            ReportRegistry::new(),
            ExtractedDataCache::new(),
            SessionState::new(),
        )
    }

    /// Create a store that writes through to the given backend
    ///
    /// Call [`ReportStore::load`] to hydrate existing state.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::from_parts(
            ReportRegistry::with_store(store.clone()),
            ExtractedDataCache::with_store(store.clone()),
            SessionState::with_store(store),
        )
    }

    fn from_parts(
        registry: ReportRegistry,
        cache: ExtractedDataCache,
        session: SessionState,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            cache: Arc::new(cache),
            session: Arc::new(session),
            writer: Arc::new(Mutex::new(())),
            purge: PurgeTimer::new(DEFAULT_PURGE_DELAY),
        }
    }

    /// Override the delay between sign-out and purge
    pub fn with_purge_delay(mut self, delay: Duration) -> Self {
        self.purge = PurgeTimer::new(delay);
        self
    }

    /// Load all persisted state.
    ///
    /// If nobody is signed in and reports exist afterwards, the purge
    /// timer is armed.
    pub fn load(&self) -> StoreResult<()> {
        {
            let _w = self.write_guard();
            let reports = self.registry.load()?;
            let extracted = self.cache.load()?;
            let signed_in = self.session.load()?;
            tracing::info!(
                reports,
                extracted,
                signed_in,
                "Loaded report store"
            );
        }
        if !self.session.is_signed_in() && !self.registry.is_empty() {
            self.arm_purge();
        }
        Ok(())
    }

    // === Reports ===

    /// Register an uploaded file and return the new report's ID.
    ///
    /// While nobody is signed in, every upload restarts the purge countdown.
    pub fn add_report(&self, meta: FileMeta) -> StoreResult<ReportId> {
        let id = {
            let _w = self.write_guard();
            self.registry.add(meta)?
        };
        tracing::info!(report_id = %id, "Report added");
        self.rearm_if_signed_out();
        Ok(id)
    }

    /// Get a report by ID
    pub fn get_report(&self, id: &ReportId) -> Option<ReportRecord> {
        self.registry.get(id)
    }

    /// All reports in upload order
    pub fn list_reports(&self) -> Vec<ReportRecord> {
        self.registry.list()
    }

    pub fn report_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_report(&self, id: &ReportId) -> bool {
        self.registry.contains(id)
    }

    /// Remove a report together with its extracted data.
    ///
    /// Returns whether the report existed. While nobody is signed in the
    /// purge countdown restarts, or is disarmed when no reports remain.
    /// If the extracted data cannot be dropped the report is put back.
    pub fn remove_report(&self, id: &ReportId) -> StoreResult<bool> {
        {
            let _w = self.write_guard();
            let before = self.registry.list();
            if self.registry.remove(id)?.is_none() {
                return Ok(false);
            }
            let dropped = match self.cache.remove(id) {
                Ok(dropped) => dropped,
                Err(e) => {
                    restore_reports(&self.registry, before);
                    return Err(e.into());
                }
            };
            tracing::info!(report_id = %id, dropped_data = dropped.is_some(), "Report removed");
        }
        self.rearm_if_signed_out();
        Ok(true)
    }

    /// Set the `processed` flag. Unknown IDs are ignored.
    pub fn set_report_processed(&self, id: &ReportId, processed: bool) -> StoreResult<()> {
        let _w = self.write_guard();
        self.registry.set_processed(id, processed)?;
        Ok(())
    }

    /// Set the `processing` flag. Unknown IDs are ignored.
    pub fn set_report_processing(&self, id: &ReportId, processing: bool) -> StoreResult<()> {
        let _w = self.write_guard();
        self.registry.set_processing(id, processing)?;
        Ok(())
    }

    /// Move a report from `new` to `processing`.
    ///
    /// Fails if the report is unknown, already processed, or already in
    /// flight, so at most one extraction runs per report.
    pub fn begin_processing(&self, id: &ReportId) -> StoreResult<ReportRecord> {
        let _w = self.write_guard();
        let mut report = self
            .registry
            .get(id)
            .ok_or_else(|| StoreError::ReportNotFound(id.clone()))?;
        if report.processed {
            return Err(StoreError::AlreadyProcessed(id.clone()));
        }
        if report.processing {
            return Err(StoreError::AlreadyProcessing(id.clone()));
        }
        self.registry.set_processing(id, true)?;
        report.processing = true;
        Ok(report)
    }

    // === Extracted data ===

    /// Attach extracted data to its report.
    ///
    /// The report is marked `processed=true, processing=false` in the same
    /// write section. Fails with [`StoreError::DanglingReference`] if the
    /// report doesn't exist. If the report's flags cannot be written the
    /// previous extracted data is put back.
    pub fn add_extracted_data(&self, record: ExtractedDataRecord) -> StoreResult<()> {
        let _w = self.write_guard();
        let report_id = record.report_id.clone();
        if !self.registry.contains(&report_id) {
            return Err(StoreError::DanglingReference(report_id));
        }
        let previous = self.cache.get(&report_id);
        self.cache.insert(record)?;
        if let Err(e) = self.registry.set_flags(&report_id, true, false) {
            let undo = match previous {
                Some(previous) => self.cache.insert(previous),
                None => self.cache.remove(&report_id).map(|_| ()),
            };
            if let Err(undo) = undo {
                tracing::error!(report_id = %report_id, "Failed to roll back extracted data: {}", undo);
            }
            return Err(e.into());
        }
        tracing::info!(report_id = %report_id, "Extracted data attached");
        Ok(())
    }

    /// Get the extracted data for a report
    pub fn get_extracted_data(&self, report_id: &ReportId) -> Option<ExtractedDataRecord> {
        self.cache.get(report_id)
    }

    /// Snapshot of all extracted data, keyed by report ID
    pub fn extracted_data(&self) -> HashMap<ReportId, ExtractedDataRecord> {
        self.cache.all()
    }

    // === Session ===

    /// The signed-in user, if any
    pub fn user(&self) -> Option<UserIdentity> {
        self.session.user()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    /// Sign in (`Some`) or out (`None`).
    ///
    /// Every call cancels the pending purge. Signing out while reports
    /// exist arms a new one.
    pub fn set_user(&self, user: Option<UserIdentity>) -> StoreResult<()> {
        let signing_out = user.is_none();
        {
            let _w = self.write_guard();
            self.session.set(user)?;
        }
        self.purge.cancel();
        if signing_out {
            tracing::info!("User signed out");
            if !self.registry.is_empty() {
                self.arm_purge();
            }
        } else {
            tracing::info!("User signed in");
        }
        Ok(())
    }

    /// True while a purge is scheduled but has not fired
    pub fn purge_pending(&self) -> bool {
        self.purge.is_pending()
    }

    pub fn purge_delay(&self) -> Duration {
        self.purge.delay()
    }

    /// Clear all reports and extracted data now if nobody is signed in.
    ///
    /// Returns whether anything was purged.
    pub fn purge_if_signed_out(&self) -> StoreResult<bool> {
        purge_if_signed_out(&self.registry, &self.cache, &self.session, &self.writer)
    }

    /// While signed out, restart the countdown after the report count
    /// changes, or disarm it once nothing is left to purge.
    fn rearm_if_signed_out(&self) {
        if self.session.is_signed_in() {
            return;
        }
        if self.registry.is_empty() {
            self.purge.cancel();
        } else {
            self.arm_purge();
        }
    }

    fn arm_purge(&self) {
        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let session = self.session.clone();
        let writer = self.writer.clone();
        self.purge.schedule(move || {
            if let Err(e) = purge_if_signed_out(&registry, &cache, &session, &writer) {
                tracing::error!("Purge failed: {}", e);
            }
        });
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn purge_if_signed_out(
    registry: &ReportRegistry,
    cache: &ExtractedDataCache,
    session: &SessionState,
    writer: &Mutex<()>,
) -> StoreResult<bool> {
    let _w = writer.lock().unwrap_or_else(PoisonError::into_inner);
    if session.is_signed_in() {
        tracing::debug!("User signed in; purge skipped");
        return Ok(false);
    }
    let before = registry.list();
    let reports = before.len();
    let extracted = cache.len();
    registry.clear()?;
    if let Err(e) = cache.clear() {
        restore_reports(registry, before);
        return Err(e.into());
    }
    tracing::info!(reports, extracted, "Purged data left after sign-out");
    Ok(reports > 0 || extracted > 0)
}

/// Put the registry back after a later step of a multi-part write failed
fn restore_reports(registry: &ReportRegistry, before: Vec<ReportRecord>) {
    if let Err(e) = registry.restore(before) {
        tracing::error!("Failed to roll back reports: {}", e);
    }
}
