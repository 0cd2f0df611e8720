//! The run artifact: one JSON document per run, versioned by timestamp in
//! its filename. It is the operator-facing audit trail; the store, not the
//! artifact, stays authoritative for subsequent runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::CanonicalActivity;
use crate::sync::RunStats;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifact {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub total_activities: usize,
    pub categories_processed: u64,
    pub activities: Vec<CanonicalActivity>,
    pub stats: RunStats,
}

/// Writes the artifact under `dir` (created on demand) and returns its
/// path. Filenames carry the UTC timestamp, so artifacts accumulate and are
/// never overwritten.
pub async fn write_run_artifact(
    dir: &Path,
    provider: &str,
    activities: &[CanonicalActivity],
    categories_processed: u64,
    stats: &RunStats,
) -> anyhow::Result<PathBuf> {
    let artifact = RunArtifact {
        timestamp: Utc::now(),
        provider: provider.to_string(),
        total_activities: activities.len(),
        categories_processed,
        activities: activities.to_vec(),
        stats: *stats,
    };

    tokio::fs::create_dir_all(dir).await?;
    let filename = format!(
        "run-{}-{}.json",
        provider,
        artifact.timestamp.format("%Y%m%dT%H%M%S%.3fZ")
    );
    let path = dir.join(filename);
    let json = serde_json::to_string_pretty(&artifact)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
