pub mod artifact;
pub mod category_scraper;
pub mod config;
pub mod context;
pub mod dedupe;
pub mod driver;
pub mod error;
pub mod extract;
pub mod hub_scraper;
pub mod normalize;
pub mod orchestrator;
pub mod ratelimit;
pub mod records;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use driver::{BrowserDriver, HttpDriver, Locator, ScriptedDriver};
pub use error::{ScrapeError, ScrapeResult};
pub use orchestrator::{Orchestrator, RunReport};
pub use records::{CanonicalActivity, RawCandidate, SourceStrategy};
pub use store::{ActivityStore, MemoryStore, PostgresStore};
pub use sync::RunStats;
