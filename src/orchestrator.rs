//! Top-level run driver: owns the category worklist, retries each failed
//! category once, enforces the global deadline, and funnels the surviving
//! candidates through dedup → confidence gate → canonicalize → sync →
//! artifact.

use std::path::PathBuf;

use chrono::Utc;
use log::{error, info, warn};
use scraper::Html;

use crate::artifact;
use crate::category_scraper::CategoryScraper;
use crate::config::SyncConfig;
use crate::context::RunContext;
use crate::dedupe;
use crate::driver::BrowserDriver;
use crate::error::ScrapeError;
use crate::hub_scraper::{self, CategoryEntry};
use crate::records::CanonicalActivity;
use crate::store::ActivityStore;
use crate::sync::{self, RunStats};

/// Terminal report for one run.
#[derive(Debug)]
pub struct RunReport {
    pub provider: String,
    pub total_activities: usize,
    pub categories_processed: u64,
    pub categories_failed: u64,
    pub stats: RunStats,
    pub artifact_path: Option<PathBuf>,
}

pub struct Orchestrator<D: BrowserDriver> {
    driver: D,
    config: SyncConfig,
}

impl<D: BrowserDriver> Orchestrator<D> {
    pub fn new(driver: D, config: SyncConfig) -> Self {
        Orchestrator { driver, config }
    }

    pub async fn run(&mut self, store: &dyn ActivityStore) -> anyhow::Result<RunReport> {
        let mut ctx = RunContext::new(&self.config.provider, self.config.run_deadline_secs);

        let entries = self.discover_worklist().await?;
        info!(
            "hub listed {} categories for provider '{}'",
            entries.len(),
            self.config.provider
        );

        for entry in &entries {
            if ctx.deadline_exceeded() {
                warn!(
                    "run deadline reached with {} categories left; committing partial results",
                    entries.len() as u64 - ctx.categories_processed - ctx.categories_failed
                );
                break;
            }
            self.scrape_category(&entry.name, &mut ctx).await;
        }

        let deduped = dedupe::dedupe_candidates(std::mem::take(&mut ctx.candidates));
        let total_deduped = deduped.len();
        let kept: Vec<_> = deduped
            .into_iter()
            .filter(|candidate| {
                // `populated_fields` excludes the always-present name.
                let fields = candidate.populated_fields() + 1;
                if fields < self.config.min_candidate_fields {
                    warn!(
                        "dropping low-confidence candidate '{}' ({:?}, {} fields)",
                        candidate.name,
                        candidate.source_strategy,
                        fields
                    );
                    return false;
                }
                true
            })
            .collect();
        if kept.len() < total_deduped {
            info!(
                "{} low-confidence candidates dropped before sync",
                total_deduped - kept.len()
            );
        }

        let today = ctx.started_at.date_naive();
        let now = Utc::now();
        let activities: Vec<CanonicalActivity> = kept
            .iter()
            .map(|candidate| {
                CanonicalActivity::from_candidate(&self.config.provider, candidate, today, now)
            })
            .collect();

        let stats = sync::commit_run(store, &self.config.provider, &activities).await;

        let artifact_path = match artifact::write_run_artifact(
            &self.config.artifact_dir,
            &self.config.provider,
            &activities,
            ctx.categories_processed,
            &stats,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                error!("artifact write failed: {e}");
                None
            }
        };

        Ok(RunReport {
            provider: self.config.provider.clone(),
            total_activities: activities.len(),
            categories_processed: ctx.categories_processed,
            categories_failed: ctx.categories_failed,
            stats,
            artifact_path,
        })
    }

    /// Loads the hub once and enumerates the category worklist from it. A
    /// hub that cannot be loaded or lists nothing is a fatal run error;
    /// there is nothing to traverse.
    async fn discover_worklist(&mut self) -> anyhow::Result<Vec<CategoryEntry>> {
        let hub_url = self.config.hub_url.clone();
        tokio::time::timeout(self.config.nav_timeout, self.driver.navigate(&hub_url))
            .await
            .map_err(|_| anyhow::anyhow!("hub navigation timed out: {hub_url}"))??;
        self.driver.wait_for_stable(self.config.nav_timeout).await?;
        let document = self.driver.document().await?;

        let entries = {
            let doc = Html::parse_document(&document);
            hub_scraper::discover_categories(&doc, self.config.categories.as_deref())
        };
        if entries.is_empty() {
            anyhow::bail!("no category entries found on hub {hub_url}");
        }
        Ok(entries)
    }

    /// One retry on failure; a second failure is a permanent skip for this
    /// run.
    async fn scrape_category(&mut self, name: &str, ctx: &mut RunContext) {
        let scraper = CategoryScraper {
            hub_url: self.config.hub_url.clone(),
            category: name.to_string(),
            nav_timeout: self.config.nav_timeout,
            max_depth: self.config.max_depth,
            max_expand_rounds: self.config.max_expand_rounds,
            max_sublinks: self.config.max_sublinks,
        };
        for attempt in 0..2 {
            match scraper.scrape(&mut self.driver).await {
                Ok(candidates) => {
                    info!("category '{name}': {} candidates", candidates.len());
                    ctx.candidates.extend(candidates);
                    ctx.categories_processed += 1;
                    return;
                }
                Err(e) if attempt == 0 => {
                    if ctx.deadline_exceeded() {
                        error!(
                            "category '{name}' failed ({e}) and will not retry: {}",
                            ScrapeError::RunDeadlineExceeded
                        );
                        ctx.categories_failed += 1;
                        return;
                    }
                    warn!("category '{name}' failed ({e}); retrying once");
                }
                Err(e) => {
                    error!("category '{name}' failed twice ({e}); skipping for this run");
                    ctx.categories_failed += 1;
                }
            }
        }
    }
}
