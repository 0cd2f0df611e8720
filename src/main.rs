use dotenv::dotenv;
use log::LevelFilter;
use log::{info, warn};

use recsync::config::SyncConfig;
use recsync::driver::HttpDriver;
use recsync::orchestrator::Orchestrator;
use recsync::store::{ActivityStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = SyncConfig::new()?;
    let driver = HttpDriver::new()?;

    // Postgres when configured; otherwise the run only feeds the artifact.
    let store: Box<dyn ActivityStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.migrate().await?;
            Box::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; activities will only be written to the run artifact");
            Box::new(MemoryStore::new())
        }
    };

    let mut orchestrator = Orchestrator::new(driver, config);
    let report = orchestrator.run(store.as_ref()).await?;

    info!(
        "run complete for '{}': {} activities ({} created, {} updated, {} removed, {} errors); {} categories processed, {} skipped",
        report.provider,
        report.total_activities,
        report.stats.created,
        report.stats.updated,
        report.stats.removed,
        report.stats.errors,
        report.categories_processed,
        report.categories_failed
    );
    if let Some(path) = &report.artifact_path {
        info!("run artifact written to {}", path.display());
    }
    Ok(())
}
