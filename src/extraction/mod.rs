//! Extraction pipeline
//!
//! An [`Extractor`] turns a report into structured content. The
//! [`ExtractionCoordinator`] runs extractors as background tasks and
//! attaches their output to the store, so each report moves from
//! `processing` to `processed` exactly once.

mod cancel;
mod coordinator;
mod http;
mod traits;

pub use cancel::CancellationToken;
pub use coordinator::{ExtractionCoordinator, ExtractionHandle};
pub use http::{ExtractionStatus, HttpExtractor, StatusResponse, SubmitResponse};
pub use traits::{ExtractedContent, ExtractionError, ExtractionOptions, ExtractionResult, Extractor};
