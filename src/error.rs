//! Failure taxonomy for a run.
//!
//! Timeouts and empty extractions are category-local: the orchestrator
//! retries the category once and otherwise skips it. Store failures are
//! counted per record inside the sync layer. A blown run deadline truncates
//! traversal but never the commit of what was already gathered. Field
//! normalization never produces an error at all — unparseable text degrades
//! to a null field.

use std::time::Duration;

use crate::driver::DriverError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    #[error("no strategy produced candidates for {url}")]
    ExtractionEmpty { url: String },
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("store write failed: {0}")]
    StoreWrite(#[from] StoreError),
    #[error("run deadline exceeded")]
    RunDeadlineExceeded,
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
