use crate::model::{ScrapeError, ScrapeQuery, Source, UnknownVariant};
use crate::scraper::sources::{BrabysScraper, CipcScraper, GooglePlacesScraper, YellowPagesScraper};
use crate::scraper::{ScraperContext, SourceScraper};
use std::collections::HashMap;

pub type ScraperFactory = fn(ScraperContext, ScrapeQuery) -> Box<dyn SourceScraper>;

/// Maps each source to the constructor of its scraper.
pub struct ScraperRegistry {
    factories: HashMap<Source, ScraperFactory>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Source::YellowPages, yellow_pages);
        registry.register(Source::Brabys, brabys);
        registry.register(Source::GooglePlaces, google_places);
        registry.register(Source::Cipc, cipc);
        registry
    }

    pub fn register(&mut self, source: Source, factory: ScraperFactory) {
        self.factories.insert(source, factory);
    }

    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.factories.keys().copied().collect();
        sources.sort();
        sources
    }

    pub fn build(
        &self,
        source: Source,
        ctx: ScraperContext,
        query: ScrapeQuery,
    ) -> Result<Box<dyn SourceScraper>, ScrapeError> {
        let factory = self
            .factories
            .get(&source)
            .ok_or_else(|| UnknownVariant::new("source", source.as_str()))?;
        Ok(factory(ctx, query))
    }
}

fn yellow_pages(ctx: ScraperContext, query: ScrapeQuery) -> Box<dyn SourceScraper> {
    Box::new(YellowPagesScraper::new(ctx, query))
}

fn brabys(ctx: ScraperContext, query: ScrapeQuery) -> Box<dyn SourceScraper> {
    Box::new(BrabysScraper::new(ctx, query))
}

fn google_places(ctx: ScraperContext, query: ScrapeQuery) -> Box<dyn SourceScraper> {
    Box::new(GooglePlacesScraper::new(ctx, query))
}

fn cipc(ctx: ScraperContext, query: ScrapeQuery) -> Box<dyn SourceScraper> {
    Box::new(CipcScraper::new(ctx, query))
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::with_defaults()
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

    fn context() -> ScraperContext {
        ScraperContext::new(
            Arc::new(ScriptedFetcher::new()),
            Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap())),
            ScraperConfig::immediate(),
        )
    }

    #[test]
    fn defaults_cover_every_scrapeable_source() {
        let registry = ScraperRegistry::with_defaults();
        assert_eq!(registry.sources(), Source::SCRAPEABLE.to_vec());
        for source in Source::SCRAPEABLE {
            let scraper = registry.build(source, context(), ScrapeQuery::new("plumber", "durban")).unwrap();
            assert_eq!(scraper.source(), source);
        }
    }

    #[test]
    fn manual_has_no_scraper() {
        let err = ScraperRegistry::with_defaults()
            .build(Source::Manual, context(), ScrapeQuery::new("plumber", "durban"))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Unknown source: manual");
    }
}
