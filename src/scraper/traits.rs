use crate::config::ScraperConfig;
use crate::model::{ScrapeError, Source};
use crate::scraper::Fetcher;
use crate::storage::SqliteStorage;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One source scraper bound to one query. `scrape` returns how many
/// businesses were newly created.
#[async_trait::async_trait]
pub trait SourceScraper: Send + Sync {
    fn source(&self) -> Source;
    async fn scrape(&self) -> Result<usize, ScrapeError>;
}

/// Shared handles and resolved configuration handed to every scraper.
#[derive(Clone)]
pub struct ScraperContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub config: ScraperConfig,
}

impl ScraperContext {
    pub fn new(fetcher: Arc<dyn Fetcher>, storage: Arc<Mutex<SqliteStorage>>, config: ScraperConfig) -> Self {
        Self { fetcher, storage, config }
    }
}
