//! AnalystAI: report registry and extracted-data store
//!
//! Tracks analyst report PDFs through upload → processing → processed,
//! keeps the structured data extracted from each one, and remembers the
//! signed-in user. All state is written through to a key-value backend.
//!
//! # Core Concepts
//!
//! - **Reports**: uploaded files and their lifecycle flags
//! - **Extracted data**: one bundle of text, tables, charts and insights per report
//! - **Session**: the optional signed-in user; signing out arms a delayed purge
//!
//! # Example
//!
//! ```
//! use analystai::{FileMeta, ReportStore};
//!
//! let store = ReportStore::new();
//! let id = store
//!     .add_report(FileMeta::new("Q1.pdf", 2048, "application/pdf", 1000))
//!     .unwrap();
//! assert!(!store.get_report(&id).unwrap().processed);
//! ```

pub mod config;
pub mod extraction;
mod report;
pub mod storage;

pub use config::{ApiConfig, Config};
pub use extraction::{
    ExtractedContent, ExtractionCoordinator, ExtractionError, ExtractionHandle, ExtractionOptions,
    ExtractionResult, Extractor, HttpExtractor,
};
pub use report::{
    detect_mime_type, format_size, ExtractedChart, ExtractedDataCache, ExtractedDataRecord,
    ExtractedTable, FileMeta, Insight, PurgeTimer, ReportId, ReportRecord, ReportRegistry,
    ReportStatus, ReportStore, SessionState, StoreError, StoreResult, UserIdentity,
    DEFAULT_PURGE_DELAY, PDF_MIME_TYPE,
};
pub use storage::{KeyValueStore, MemoryStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
