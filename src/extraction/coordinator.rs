//! Extraction coordinator: drives a report from `new` to `processed`
//!
//! `start()` flips the report to `processing` synchronously, then runs the
//! extractor as a background tokio task. Success attaches the data (which
//! flips the report to `processed`); failure or cancellation resets
//! `processing`.

use super::cancel::CancellationToken;
use super::traits::{ExtractionError, ExtractionOptions, ExtractionResult, Extractor};
use crate::report::{ExtractedDataRecord, ReportId, ReportRecord, ReportStore, StoreError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of extractions allowed to run at once
const DEFAULT_CONCURRENCY: usize = 2;

/// Handle to a running extraction
pub struct ExtractionHandle {
    report_id: ReportId,
    token: CancellationToken,
    task: JoinHandle<ExtractionResult<ExtractedDataRecord>>,
}

impl ExtractionHandle {
    pub fn report_id(&self) -> &ReportId {
        &self.report_id
    }

    /// Request cancellation. The report returns to `new` unless the data
    /// was already attached.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the extraction to finish
    pub async fn join(self) -> ExtractionResult<ExtractedDataRecord> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ExtractionError::Cancelled),
            Err(e) => Err(ExtractionError::Failed(format!("extraction task panicked: {}", e))),
        }
    }
}

/// Runs extractions against one backend with bounded concurrency
pub struct ExtractionCoordinator {
    extractor: Arc<dyn Extractor>,
    semaphore: Arc<Semaphore>,
}

impl ExtractionCoordinator {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            extractor,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    /// Set how many extractions may run at once (minimum 1).
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Start extracting a report.
    ///
    /// Fails immediately if the report is unknown, already processed or
    /// already processing. Must be called within a tokio runtime.
    pub fn start(
        &self,
        store: Arc<ReportStore>,
        report_id: &ReportId,
        options: ExtractionOptions,
    ) -> ExtractionResult<ExtractionHandle> {
        let report = store.begin_processing(report_id)?;
        tracing::info!(
            report_id = %report_id,
            extractor = self.extractor.name(),
            "Extraction started"
        );

        let token = CancellationToken::new();
        let task = tokio::spawn(run_extraction(
            store,
            self.extractor.clone(),
            self.semaphore.clone(),
            report,
            options,
            token.clone(),
        ));

        Ok(ExtractionHandle {
            report_id: report_id.clone(),
            token,
            task,
        })
    }
}

async fn run_extraction(
    store: Arc<ReportStore>,
    extractor: Arc<dyn Extractor>,
    semaphore: Arc<Semaphore>,
    report: ReportRecord,
    options: ExtractionOptions,
    token: CancellationToken,
) -> ExtractionResult<ExtractedDataRecord> {
    let report_id = report.id.clone();

    let outcome = tokio::select! {
        _ = token.cancelled() => Err(ExtractionError::Cancelled),
        result = async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| ExtractionError::Cancelled)?;
            extractor.extract(&report, &options).await
        } => result,
    };

    let attached = outcome.and_then(|content| {
        // A cancel that lands after the backend answered still wins.
        if token.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let record = content.into_record(report_id.clone(), &options);
        store.add_extracted_data(record.clone())?;
        Ok(record)
    });

    match attached {
        Ok(record) => {
            tracing::info!(report_id = %report_id, pages = record.page_count(), "Extraction complete");
            Ok(record)
        }
        Err(ExtractionError::Store(StoreError::DanglingReference(_))) => {
            tracing::warn!(report_id = %report_id, "Report removed during extraction; result discarded");
            Err(ExtractionError::Store(StoreError::ReportNotFound(report_id)))
        }
        Err(e) => {
            if matches!(e, ExtractionError::Cancelled) {
                tracing::info!(report_id = %report_id, "Extraction cancelled");
            } else {
                tracing::error!(report_id = %report_id, "Extraction failed: {}", e);
            }
            if let Err(reset) = store.set_report_processing(&report_id, false) {
                tracing::error!(report_id = %report_id, "Failed to reset processing flag: {}", reset);
            }
            Err(e)
        }
    }
}
