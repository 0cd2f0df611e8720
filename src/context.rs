use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::records::RawCandidate;

/// Per-run mutable state. Created by the orchestrator, threaded through the
/// traversal, dropped at run end — nothing the run accumulates lives in
/// module-level globals.
pub struct RunContext {
    pub provider: String,
    pub started_at: DateTime<Utc>,
    deadline: Option<Instant>,
    /// Everything extracted this run, across categories and recursion
    /// levels; deduplicated once at run end.
    pub candidates: Vec<RawCandidate>,
    pub categories_processed: u64,
    pub categories_failed: u64,
}

impl RunContext {
    pub fn new(provider: &str, run_deadline_secs: Option<u64>) -> Self {
        RunContext {
            provider: provider.to_string(),
            started_at: Utc::now(),
            deadline: run_deadline_secs.map(|secs| Instant::now() + Duration::from_secs(secs)),
            candidates: Vec::new(),
            categories_processed: 0,
            categories_failed: 0,
        }
    }

    /// True once the global deadline has passed. The orchestrator stops
    /// issuing category visits at that point but still commits what was
    /// gathered.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
