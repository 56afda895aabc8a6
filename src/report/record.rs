//! Report records and the file metadata they are created from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;
use uuid::Uuid;

/// Unique identifier for a report
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Create a new random ReportId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a ReportId from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Metadata of an uploaded file, captured at intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Modification time in epoch milliseconds
    pub last_modified: i64,
}

impl FileMeta {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            last_modified,
        }
    }

    /// Read metadata for a file on disk.
    ///
    /// The MIME type is derived from the extension; `last_modified` falls
    /// back to 0 on platforms that don't report modification times.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file: {}", path.display()),
            ));
        }

        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type: detect_mime_type(path).to_string(),
            last_modified,
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Detect MIME type from file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME_TYPE,
        Some("txt") => "text/plain",
        Some("md") | Some("markdown") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Human-readable file size (B, KB, MB).
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// A report tracked through upload → processing → processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: ReportId,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub last_modified: i64,
    pub uploaded_at: DateTime<Utc>,
    /// True once extracted data is attached
    pub processed: bool,
    /// True while an extraction is in flight
    pub processing: bool,
}

impl ReportRecord {
    /// Create a fresh, unprocessed record from intake metadata
    pub fn new(meta: FileMeta) -> Self {
        Self {
            id: ReportId::new(),
            name: meta.name,
            size: meta.size,
            mime_type: meta.mime_type,
            last_modified: meta.last_modified,
            uploaded_at: Utc::now(),
            processed: false,
            processing: false,
        }
    }

    pub fn status(&self) -> ReportStatus {
        if self.processed {
            ReportStatus::Processed
        } else if self.processing {
            ReportStatus::Processing
        } else {
            ReportStatus::New
        }
    }
}

/// Lifecycle position of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    New,
    Processing,
    Processed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
        }
    }
}
