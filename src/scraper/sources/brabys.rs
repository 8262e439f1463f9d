use crate::model::{ScrapeError, ScrapeQuery, Source};
use crate::scraper::{ScraperContext, SourceScraper};
use async_trait::async_trait;
use tracing::warn;

/// Brabys blocks automated access, so this scraper never touches the network.
pub struct BrabysScraper {
    query: ScrapeQuery,
}

impl BrabysScraper {
    pub fn new(_ctx: ScraperContext, query: ScrapeQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl SourceScraper for BrabysScraper {
    fn source(&self) -> Source {
        Source::Brabys
    }

    async fn scrape(&self) -> Result<usize, ScrapeError> {
        warn!(
            "[brabys] Skipping {} in {}: site blocks automated access",
            self.query.category, self.query.location
        );
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::scraper::testing::ScriptedFetcher;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn returns_zero_without_network() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let storage = Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()));
        let ctx = ScraperContext::new(fetcher.clone(), storage, ScraperConfig::immediate());

        let scraper = BrabysScraper::new(ctx, ScrapeQuery::new("plumber", "cape town"));
        assert_eq!(scraper.scrape().await.unwrap(), 0);
        assert_eq!(fetcher.request_count(), 0);
    }
}
