use crate::model::{FetchError, NewBusiness, ParserError, RawListing, ScrapeError, ScrapeQuery, Source, StorageError, UpsertOutcome};
use crate::normalizer::normalize_all;
use crate::scraper::{FetchRequest, ScraperContext};
use crate::storage::SqliteStorage;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What a single results page turned out to be.
#[derive(Debug)]
pub enum PageResult {
    Entries(Vec<RawListing>),
    Empty,
    ParseFailed(String),
    FetchFailed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxPages,
    Empty { page: u32 },
    FetchFailed { page: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationReport {
    pub pages_visited: u32,
    pub created: usize,
    pub stop: StopReason,
}

/// A directory that serves numbered results pages.
#[async_trait]
pub trait PagedSource: Send + Sync {
    fn source(&self) -> Source;
    fn query(&self) -> &ScrapeQuery;
    fn page_request(&self, page: u32) -> FetchRequest;
    fn extract(&self, body: &str) -> Result<Vec<RawListing>, ParserError>;

    /// Fills in contact details from per-listing pages. Runs only when the
    /// query asks for details.
    async fn enrich(&self, _ctx: &ScraperContext, listings: Vec<RawListing>) -> Vec<RawListing> {
        listings
    }
}

pub async fn fetch_page<S>(ctx: &ScraperContext, source: &S, page: u32) -> PageResult
where
    S: PagedSource + ?Sized,
{
    let request = source.page_request(page);
    let response = match ctx.fetcher.fetch(&request).await {
        Ok(response) => response,
        Err(e) => return PageResult::FetchFailed(e),
    };

    match source.extract(&response.body) {
        Ok(listings) if listings.is_empty() => PageResult::Empty,
        Ok(listings) => PageResult::Entries(listings),
        Err(e) => PageResult::ParseFailed(e.to_string()),
    }
}

/// Walks pages `1..=max_pages`, persisting each page as it arrives.
pub async fn paginate<S>(ctx: &ScraperContext, source: &S) -> Result<PaginationReport, ScrapeError>
where
    S: PagedSource + ?Sized,
{
    let tag = source.source();
    let query = source.query();
    let mut created = 0;
    let mut pages_visited = 0;

    for page in 1..=query.max_pages {
        pages_visited = page;

        match fetch_page(ctx, source, page).await {
            PageResult::FetchFailed(e) => {
                warn!("[{}] Page {} fetch failed, stopping: {}", tag, page, e);
                return Ok(PaginationReport { pages_visited, created, stop: StopReason::FetchFailed { page } });
            }
            PageResult::Empty => {
                debug!("[{}] Page {} is empty, stopping", tag, page);
                return Ok(PaginationReport { pages_visited, created, stop: StopReason::Empty { page } });
            }
            PageResult::ParseFailed(message) => {
                warn!("[{}] Page {} could not be parsed: {}", tag, page, message);
            }
            PageResult::Entries(listings) => {
                info!("[{}] Page {}: {} listings", tag, page, listings.len());
                let listings = if query.fetch_details {
                    source.enrich(ctx, listings).await
                } else {
                    listings
                };
                let records = normalize_all(listings, query, tag);
                created += save_records(&ctx.storage, &records).await?;
            }
        }
    }

    Ok(PaginationReport { pages_visited, created, stop: StopReason::MaxPages })
}

/// Upserts a batch under a single lock and returns how many were new.
pub async fn save_records(storage: &Mutex<SqliteStorage>, records: &[NewBusiness]) -> Result<usize, StorageError> {
    let storage = storage.lock().await;
    let mut created = 0;
    for record in records {
        if storage.upsert_business(record)? == UpsertOutcome::Created {
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::scraper::testing::ScriptedFetcher;
    use std::sync::Arc;

    /// Pages are plain text, one `name|city` per line. `!` marks a broken page.
    struct LineDirectory {
        query: ScrapeQuery,
    }

    #[async_trait]
    impl PagedSource for LineDirectory {
        fn source(&self) -> Source {
            Source::YellowPages
        }

        fn query(&self) -> &ScrapeQuery {
            &self.query
        }

        fn page_request(&self, page: u32) -> FetchRequest {
            FetchRequest::get("https://directory.test/list").query("page", page.to_string())
        }

        fn extract(&self, body: &str) -> Result<Vec<RawListing>, ParserError> {
            if body.starts_with('!') {
                return Err(ParserError::MissingField("garbled".into()));
            }
            Ok(body
                .lines()
                .filter_map(|line| line.split_once('|'))
                .map(|(name, city)| RawListing {
                    name: Some(name.into()),
                    city: Some(city.into()),
                    ..RawListing::default()
                })
                .collect())
        }
    }

    fn context(fetcher: ScriptedFetcher) -> (ScraperContext, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(fetcher);
        let storage = Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()));
        (ScraperContext::new(fetcher.clone(), storage, ScraperConfig::immediate()), fetcher)
    }

    fn directory(max_pages: u32) -> LineDirectory {
        LineDirectory { query: ScrapeQuery::new("plumber", "cape town").max_pages(max_pages) }
    }

    #[tokio::test]
    async fn empty_page_stops_and_counts_earlier_pages_only() {
        let fetcher = ScriptedFetcher::new()
            .on("page=1", "Joe's Plumbing|Cape Town\nDrain Kings|Cape Town")
            .on("page=2", "")
            .on("page=3", "Never Reached|Cape Town");
        let (ctx, fetcher) = context(fetcher);

        let report = paginate(&ctx, &directory(3)).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.stop, StopReason::Empty { page: 2 });
        assert_eq!(fetcher.request_count(), 2);
        assert_eq!(ctx.storage.lock().await.count_businesses().unwrap(), 2);
    }

    #[tokio::test]
    async fn parse_failure_skips_the_page_and_continues() {
        let fetcher = ScriptedFetcher::new()
            .on("page=1", "!<<garbage")
            .on("page=2", "Acme Bakery|Durban");
        let (ctx, _) = context(fetcher);

        let report = paginate(&ctx, &directory(2)).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.stop, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn fetch_failure_ends_pagination_without_error() {
        let fetcher = ScriptedFetcher::new()
            .on("page=1", "Acme Bakery|Durban")
            .fail("page=2", 503);
        let (ctx, fetcher) = context(fetcher);

        let report = paginate(&ctx, &directory(5)).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.stop, StopReason::FetchFailed { page: 2 });
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn repeat_listings_are_not_counted_twice() {
        let fetcher = ScriptedFetcher::new()
            .on("page=1", "Acme Bakery|Durban")
            .on("page=2", "acme bakery|Durban\nAcme Bakery|Durban\nAcme Bakery|Pretoria");
        let (ctx, _) = context(fetcher);

        let report = paginate(&ctx, &directory(2)).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(ctx.storage.lock().await.count_businesses().unwrap(), 2);
    }

    #[tokio::test]
    async fn zero_max_pages_fetches_nothing() {
        let (ctx, fetcher) = context(ScriptedFetcher::new());
        let report = paginate(&ctx, &directory(0)).await.unwrap();
        assert_eq!(report, PaginationReport { pages_visited: 0, created: 0, stop: StopReason::MaxPages });
        assert_eq!(fetcher.request_count(), 0);
    }
}
