//! Shared fixtures for integration tests

#![allow(dead_code)]

use analystai::{
    ExtractedContent, ExtractedDataRecord, ExtractionOptions, ExtractionResult, Extractor,
    FileMeta, KeyValueStore, OpenStore, ReportId, ReportRecord, ReportStore, SqliteStore,
    UserIdentity,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The upload from the Q1 scenario
pub fn q1_meta() -> FileMeta {
    FileMeta::new("Q1.pdf", 2048, "application/pdf", 1000)
}

pub fn analyst() -> UserIdentity {
    UserIdentity::new("u1", "analyst@example.com", "Ada Analyst")
}

/// Minimal bundle: one page of text and nothing else
pub fn single_page(report_id: &ReportId, text: &str) -> ExtractedDataRecord {
    ExtractedDataRecord::new(report_id.clone())
        .with_id("e1")
        .with_page(text)
}

/// Open a SQLite-backed store at `path` and load it
pub fn open_sqlite(path: &Path) -> (Arc<dyn KeyValueStore>, ReportStore) {
    let backing: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(path).unwrap());
    let store = ReportStore::with_store(backing.clone());
    store.load().unwrap();
    (backing, store)
}

/// Extractor that answers with canned content after a delay
pub struct CannedExtractor {
    pub delay: Duration,
}

#[async_trait]
impl Extractor for CannedExtractor {
    fn name(&self) -> &str {
        "canned"
    }

    async fn extract(
        &self,
        report: &ReportRecord,
        _options: &ExtractionOptions,
    ) -> ExtractionResult<ExtractedContent> {
        tokio::time::sleep(self.delay).await;
        Ok(ExtractedContent {
            text: vec![format!("{} page 1", report.name), format!("{} page 2", report.name)],
            summary: Some("Quarterly market overview".to_string()),
            industry: Some("Technology".to_string()),
            ..Default::default()
        })
    }
}
