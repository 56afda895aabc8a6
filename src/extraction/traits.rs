//! Extractor trait: the contract extraction backends implement

use crate::report::{
    clamp_confidence, ExtractedChart, ExtractedDataRecord, ExtractedTable, Insight, ReportId,
    ReportRecord, StoreError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which parts of a report to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOptions {
    pub extract_text: bool,
    pub detect_charts: bool,
    pub detect_tables: bool,
    pub generate_insights: bool,
    pub vectorize: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            extract_text: true,
            detect_charts: true,
            detect_tables: true,
            generate_insights: true,
            vectorize: true,
        }
    }
}

/// What a backend produces for one report.
///
/// The coordinator turns it into an [`ExtractedDataRecord`] bound to the
/// report being processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    /// Backend-assigned ID, reused as the record ID when present
    pub source_id: Option<String>,
    pub text: Vec<String>,
    pub tables: Vec<ExtractedTable>,
    pub charts: Vec<ExtractedChart>,
    pub insights: Vec<Insight>,
    pub summary: Option<String>,
    pub industry: Option<String>,
    pub vectorized: Option<bool>,
    pub chunks: Option<u32>,
}

impl ExtractedContent {
    /// Bind the content to a report, dropping parts the options disabled
    pub fn into_record(self, report_id: ReportId, options: &ExtractionOptions) -> ExtractedDataRecord {
        ExtractedDataRecord {
            id: self.source_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            report_id,
            text: if options.extract_text { self.text } else { Vec::new() },
            tables: if options.detect_tables { self.tables } else { Vec::new() },
            charts: if options.detect_charts { self.charts } else { Vec::new() },
            insights: if options.generate_insights {
                self.insights
                    .into_iter()
                    .map(|mut i| {
                        i.confidence = clamp_confidence(i.confidence);
                        i
                    })
                    .collect()
            } else {
                Vec::new()
            },
            summary: self.summary,
            industry: self.industry,
            vectorized: if options.vectorize { self.vectorized } else { Some(false) },
            chunks: if options.vectorize { self.chunks } else { None },
        }
    }
}

/// Errors from extraction runs
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("Extraction did not complete after {polls} status checks")]
    Timeout { polls: u32 },

    #[error("Extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for extraction operations
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// A backend that turns a report into structured content.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Extract content for `report`.
    async fn extract(
        &self,
        report: &ReportRecord,
        options: &ExtractionOptions,
    ) -> ExtractionResult<ExtractedContent>;
}
