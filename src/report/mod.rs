//! Report records, extracted data, session state and the store over them

mod cache;
mod engine;
mod extracted;
mod purge;
mod record;
mod registry;
mod session;
mod user;


pub use cache::ExtractedDataCache;
pub use engine::{ReportStore, StoreError, StoreResult};
pub use extracted::{clamp_confidence, ExtractedChart, ExtractedDataRecord, ExtractedTable, Insight};
pub use purge::{PurgeTimer, DEFAULT_PURGE_DELAY};
pub use record::{
    detect_mime_type, format_size, FileMeta, ReportId, ReportRecord, ReportStatus, PDF_MIME_TYPE,
};
pub use registry::ReportRegistry;
pub use session::SessionState;
pub use user::UserIdentity;
