// Worker module: job execution units, the in-process dispatcher and sweep planners.

pub mod audit_worker;
pub mod dispatcher;
pub mod planner;
pub mod scrape_worker;

use crate::config::AppConfig;
use crate::scraper::{Fetcher, ScraperRegistry};
use crate::storage::SqliteStorage;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use dispatcher::{Dispatcher, JobQueue, WorkItem};

/// Handles shared by every worker task.
#[derive(Clone)]
pub struct WorkerContext {
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub registry: Arc<ScraperRegistry>,
    pub config: Arc<AppConfig>,
}

impl WorkerContext {
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        fetcher: Arc<dyn Fetcher>,
        registry: Arc<ScraperRegistry>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self { storage, fetcher, registry, config }
    }
}
