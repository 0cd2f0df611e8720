use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

/// The env vars a sync run reads. Only the provider and hub URL are
/// required; everything else has a default.
#[derive(Debug, Deserialize)]
pub struct SyncEnv {
    recsync_provider: String,
    recsync_hub_url: String,
    recsync_categories: Option<String>,
    recsync_nav_timeout_secs: Option<u64>,
    recsync_run_deadline_secs: Option<u64>,
    recsync_max_depth: Option<u32>,
    recsync_max_expand_rounds: Option<u32>,
    recsync_max_sublinks: Option<usize>,
    recsync_min_candidate_fields: Option<usize>,
    recsync_artifact_dir: Option<String>,
    database_url: Option<String>,
}

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub provider: String,
    pub hub_url: String,
    /// Explicit category worklist; `None` falls back to keyword discovery
    /// on the hub.
    pub categories: Option<Vec<String>>,
    pub nav_timeout: Duration,
    pub run_deadline_secs: Option<u64>,
    pub max_depth: u32,
    pub max_expand_rounds: u32,
    pub max_sublinks: usize,
    /// Candidates with fewer populated fields than this (name included) are
    /// logged and dropped instead of persisted.
    pub min_candidate_fields: usize,
    pub artifact_dir: PathBuf,
    pub database_url: Option<String>,
}

impl SyncConfig {
    pub fn new() -> anyhow::Result<Self> {
        let env = SyncEnv::load_from_env()?;
        let mut config = SyncConfig::with_defaults(&env.recsync_provider, &env.recsync_hub_url);
        config.categories = env.recsync_categories.map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        });
        if let Some(secs) = env.recsync_nav_timeout_secs {
            config.nav_timeout = Duration::from_secs(secs);
        }
        config.run_deadline_secs = env.recsync_run_deadline_secs;
        if let Some(depth) = env.recsync_max_depth {
            config.max_depth = depth;
        }
        if let Some(rounds) = env.recsync_max_expand_rounds {
            config.max_expand_rounds = rounds;
        }
        if let Some(cap) = env.recsync_max_sublinks {
            config.max_sublinks = cap;
        }
        if let Some(fields) = env.recsync_min_candidate_fields {
            config.min_candidate_fields = fields;
        }
        if let Some(dir) = env.recsync_artifact_dir {
            config.artifact_dir = dir.into();
        }
        config.database_url = env.database_url;
        Ok(config)
    }

    /// Programmatic construction with defaults; env is not consulted.
    pub fn with_defaults(provider: &str, hub_url: &str) -> Self {
        SyncConfig {
            provider: provider.to_string(),
            hub_url: hub_url.to_string(),
            categories: None,
            nav_timeout: Duration::from_secs(20),
            run_deadline_secs: None,
            max_depth: 2,
            max_expand_rounds: 5,
            max_sublinks: 24,
            min_candidate_fields: 2,
            artifact_dir: PathBuf::from("artifacts"),
            database_url: None,
        }
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}
