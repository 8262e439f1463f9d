// Scraper module: HTTP fetching, per-source scrapers and the pagination skeleton.

pub mod fetcher;
pub mod pagination;
pub mod registry;
pub mod sources;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use fetcher::{FetchRequest, Fetcher, HttpFetcher};
pub use registry::ScraperRegistry;
pub use traits::{ScraperContext, SourceScraper};
