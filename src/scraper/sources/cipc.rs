use crate::model::{ParserError, RawListing, ScrapeError, ScrapeQuery, Source};
use crate::parser::ListingParser;
use crate::parser::cipc::{CipcParser, SEARCH_URL};
use crate::scraper::pagination::{PagedSource, paginate};
use crate::scraper::{FetchRequest, ScraperContext, SourceScraper};
use async_trait::async_trait;
use tracing::info;

/// Registry records carry no address, so they are filed under this city
/// when the query names none.
const UNKNOWN_CITY: &str = "Unknown";

/// Company registry search. The results come back as one table, so there is
/// never more than a single page.
pub struct CipcScraper {
    ctx: ScraperContext,
    query: ScrapeQuery,
    parser: CipcParser,
}

impl CipcScraper {
    pub fn new(ctx: ScraperContext, mut query: ScrapeQuery) -> Self {
        query.max_pages = query.max_pages.min(1);
        if query.location.trim().is_empty() {
            query.location = UNKNOWN_CITY.to_string();
        }
        Self { ctx, query, parser: CipcParser::new() }
    }
}

#[async_trait]
impl PagedSource for CipcScraper {
    fn source(&self) -> Source {
        Source::Cipc
    }

    fn query(&self) -> &ScrapeQuery {
        &self.query
    }

    fn page_request(&self, _page: u32) -> FetchRequest {
        FetchRequest::get(SEARCH_URL)
            .query("searchvalue", self.query.category.trim())
            .html()
            .timeout(self.ctx.config.request_timeout)
    }

    fn extract(&self, body: &str) -> Result<Vec<RawListing>, ParserError> {
        self.parser.parse(body)
    }
}

#[async_trait]
impl SourceScraper for CipcScraper {
    fn source(&self) -> Source {
        Source::Cipc
    }

    async fn scrape(&self) -> Result<usize, ScrapeError> {
        let report = paginate(&self.ctx, self).await?;
        info!("[cipc] {}: {} new companies", self.query.category, report.created);
        Ok(report.created)
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

    const RESULTS: &str = r#"<table>
        <tr><th>Enterprise Name</th><th>Number</th><th>Status</th></tr>
        <tr><td>Joe's Plumbing (Pty) Ltd</td><td>2015/123456/07</td><td>IN BUSINESS</td></tr>
        <tr><td>Cape Plumbing CC</td><td>2001/000777/23</td><td>Final Deregistration</td></tr>
        </table>"#;

    #[tokio::test]
    async fn single_page_of_active_companies() {
        let fetcher = Arc::new(ScriptedFetcher::new().on("searchvalue=plumbing", RESULTS));
        let storage = Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()));
        let ctx = ScraperContext::new(fetcher.clone(), storage.clone(), ScraperConfig::immediate());

        let scraper = CipcScraper::new(ctx, ScrapeQuery::new("plumbing", "").max_pages(5));
        assert_eq!(scraper.scrape().await.unwrap(), 1);
        assert_eq!(fetcher.request_count(), 1);

        let storage = storage.lock().await;
        let company = storage
            .find_business("Joe's Plumbing (Pty) Ltd", Some("Unknown"))
            .unwrap()
            .unwrap();
        assert_eq!(company.address.as_deref(), Some("Reg No: 2015/123456/07"));
        assert_eq!(company.source, Source::Cipc);
        assert_eq!(company.category.as_deref(), Some("plumbing"));
    }
}
