//! Structured data extracted from a report

use super::record::ReportId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A table found in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub id: String,
    pub title: String,
    /// Rows of cells; the first row is usually the header
    pub data: Vec<Vec<String>>,
    pub page: u32,
}

/// A chart or figure found in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedChart {
    pub id: String,
    pub title: String,
    /// Chart kind ("bar", "line", "pie", ...)
    #[serde(rename = "type")]
    pub chart_type: String,
    pub image_url: String,
    pub page: u32,
}

/// A generated insight with a confidence score in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub text: String,
    pub confidence: f64,
    pub category: String,
}

impl Insight {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        confidence: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            confidence: clamp_confidence(confidence),
            category: category.into(),
        }
    }
}

/// Clamp a confidence score into [0, 1]; NaN becomes 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// The result bundle attached one-to-one to a processed report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDataRecord {
    pub id: String,
    pub report_id: ReportId,
    /// One entry per logical page
    pub text: Vec<String>,
    pub tables: Vec<ExtractedTable>,
    pub charts: Vec<ExtractedChart>,
    pub insights: Vec<Insight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorized: Option<bool>,
    /// Number of text segments produced for retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u32>,
}

impl ExtractedDataRecord {
    /// Create an empty bundle for a report with a fresh ID
    pub fn new(report_id: ReportId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            report_id,
            text: Vec::new(),
            tables: Vec::new(),
            charts: Vec::new(),
            insights: Vec::new(),
            summary: None,
            industry: None,
            vectorized: None,
            chunks: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_page(mut self, text: impl Into<String>) -> Self {
        self.text.push(text.into());
        self
    }

    pub fn with_table(mut self, table: ExtractedTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_chart(mut self, chart: ExtractedChart) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_insight(mut self, insight: Insight) -> Self {
        self.insights.push(insight);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn page_count(&self) -> usize {
        self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insight_confidence_is_clamped() {
        assert_eq!(Insight::new("i", "t", 1.4, "c").confidence, 1.0);
        assert_eq!(Insight::new("i", "t", -0.2, "c").confidence, 0.0);
        assert_eq!(Insight::new("i", "t", f64::NAN, "c").confidence, 0.0);
        assert_eq!(Insight::new("i", "t", 0.92, "c").confidence, 0.92);
    }

    #[test]
    fn builder_collects_pages_in_order() {
        let record = ExtractedDataRecord::new(ReportId::from("r1"))
            .with_page("p1")
            .with_page("p2")
            .with_summary("short");

        assert_eq!(record.text, vec!["p1", "p2"]);
        assert_eq!(record.page_count(), 2);
        assert_eq!(record.summary.as_deref(), Some("short"));
        assert!(record.industry.is_none());
    }
}
