use crate::model::{RawListing, ScrapeError, ScrapeQuery, Source};
use crate::normalizer::normalize_all;
use crate::parser::places::{
    DETAIL_FIELDS, DETAILS_URL, PlaceSummary, TEXT_SEARCH_URL, parse_details, parse_text_search, to_listing,
};
use crate::scraper::pagination::save_records;
use crate::scraper::{FetchRequest, ScraperContext, SourceScraper};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Keyed text-search over the Places API. Result pages are chained with
/// `next_page_token` rather than numbered.
pub struct GooglePlacesScraper {
    ctx: ScraperContext,
    query: ScrapeQuery,
}

impl GooglePlacesScraper {
    pub fn new(ctx: ScraperContext, query: ScrapeQuery) -> Self {
        Self { ctx, query }
    }

    fn search_text(&self) -> String {
        format!("{} in {}, South Africa", self.query.category, self.query.location)
    }

    fn search_request(&self, api_key: &str, page_token: Option<&str>) -> FetchRequest {
        let request = FetchRequest::get(TEXT_SEARCH_URL)
            .query("key", api_key)
            .timeout(self.ctx.config.request_timeout);
        match page_token {
            Some(token) => request.query("pagetoken", token),
            None => request.query("query", self.search_text()).query("region", "za"),
        }
    }

    /// Looks up phone and website for one place. `None` when the call fails.
    async fn place_listing(&self, api_key: &str, place: &PlaceSummary) -> Option<RawListing> {
        let request = FetchRequest::get(DETAILS_URL)
            .query("place_id", place.place_id.as_str())
            .query("fields", DETAIL_FIELDS)
            .query("key", api_key)
            .timeout(self.ctx.config.request_timeout);

        let body = match self.ctx.fetcher.fetch(&request).await {
            Ok(response) => response.body,
            Err(e) => {
                debug!("[google_places] Details failed for {}: {}", place.place_id, e);
                return None;
            }
        };
        match parse_details(&body) {
            Ok(details) => Some(to_listing(place, details)),
            Err(e) => {
                debug!("[google_places] Details unusable for {}: {}", place.place_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl SourceScraper for GooglePlacesScraper {
    fn source(&self) -> Source {
        Source::GooglePlaces
    }

    async fn scrape(&self) -> Result<usize, ScrapeError> {
        let Some(api_key) = self.ctx.config.places_api_key.as_deref() else {
            info!("[google_places] No API key configured, skipping");
            return Ok(0);
        };

        let mut created = 0;
        let mut page_token: Option<String> = None;

        for page in 1..=self.query.max_pages {
            if page_token.is_some() {
                // Tokens are not valid until a short while after they are issued.
                sleep(self.ctx.config.places_token_delay).await;
            }

            let request = self.search_request(api_key, page_token.as_deref());
            let body = match self.ctx.fetcher.fetch(&request).await {
                Ok(response) => response.body,
                Err(e) => {
                    warn!("[google_places] Search page {} failed: {}", page, e);
                    break;
                }
            };
            let response = match parse_text_search(&body) {
                Ok(response) => response,
                Err(e) => {
                    warn!("[google_places] Search page {} unreadable: {}", page, e);
                    break;
                }
            };
            if !response.is_ok() {
                info!(
                    "[google_places] Search stopped with status {} {}",
                    response.status,
                    response.error_message.as_deref().unwrap_or("")
                );
                break;
            }

            let mut listings = Vec::with_capacity(response.results.len());
            for place in &response.results {
                if let Some(listing) = self.place_listing(api_key, place).await {
                    listings.push(listing);
                }
            }

            let records = normalize_all(listings, &self.query, Source::GooglePlaces);
            created += save_records(&self.ctx.storage, &records).await?;
            info!("[google_places] Page {}: {} places", page, response.results.len());

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(created)
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

    const PAGE_ONE: &str = r#"{"status":"OK","next_page_token":"tok-2","results":[
        {"place_id":"p1","name":"Joe's Plumbing","formatted_address":"12 Long St, Cape Town, 8001, South Africa"},
        {"place_id":"p2","name":"Ghost Drains"}]}"#;
    const PAGE_TWO: &str = r#"{"status":"OK","results":[{"place_id":"p3","name":"Drain Kings"}]}"#;
    const JOE: &str = r#"{"status":"OK","result":{"formatted_phone_number":"021 555 1234","website":"https://joesplumbing.co.za"}}"#;
    const KINGS: &str = r#"{"status":"OK","result":{"formatted_phone_number":"021 444 0000"}}"#;

    fn places(fetcher: Arc<ScriptedFetcher>, storage: Arc<Mutex<SqliteStorage>>, key: Option<&str>, max_pages: u32) -> GooglePlacesScraper {
        let config = ScraperConfig {
            places_api_key: key.map(str::to_string),
            ..ScraperConfig::immediate()
        };
        GooglePlacesScraper::new(
            ScraperContext::new(fetcher, storage, config),
            ScrapeQuery::new("plumber", "cape town").max_pages(max_pages),
        )
    }

    fn scripted() -> Arc<ScriptedFetcher> {
        Arc::new(
            ScriptedFetcher::new()
                .on("pagetoken=tok-2", PAGE_TWO)
                .on("textsearch", PAGE_ONE)
                .on("place_id=p1", JOE)
                .on("place_id=p3", KINGS),
        )
    }

    fn storage() -> Arc<Mutex<SqliteStorage>> {
        Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()))
    }

    #[tokio::test]
    async fn no_api_key_means_no_requests() {
        let fetcher = scripted();
        assert_eq!(places(fetcher.clone(), storage(), None, 5).scrape().await.unwrap(), 0);
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn follows_page_tokens_and_skips_failed_details() {
        let fetcher = scripted();
        let storage = storage();

        let created = places(fetcher.clone(), storage.clone(), Some("KEY"), 5).scrape().await.unwrap();
        assert_eq!(created, 2);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 5);
        assert!(requests[0].contains("query=plumber+in+cape+town%2C+South+Africa"));
        assert!(requests[0].contains("region=za"));
        assert!(requests[3].contains("pagetoken=tok-2"));

        let storage = storage.lock().await;
        let joe = storage.find_business("Joe's Plumbing", Some("Cape Town")).unwrap().unwrap();
        assert_eq!(joe.website_url.as_deref(), Some("https://joesplumbing.co.za"));
        assert_eq!(joe.source, Source::GooglePlaces);
        assert!(storage.find_business("Ghost Drains", Some("Cape Town")).unwrap().is_none());
    }

    #[tokio::test]
    async fn max_pages_bounds_token_chasing() {
        let fetcher = scripted();
        let created = places(fetcher.clone(), storage(), Some("KEY"), 1).scrape().await.unwrap();
        assert_eq!(created, 1);
        assert!(!fetcher.requests().iter().any(|url| url.contains("pagetoken")));
    }

    #[tokio::test]
    async fn non_ok_status_ends_the_search() {
        let fetcher = Arc::new(ScriptedFetcher::new().on("textsearch", r#"{"status":"REQUEST_DENIED","error_message":"bad key"}"#));
        assert_eq!(places(fetcher.clone(), storage(), Some("KEY"), 5).scrape().await.unwrap(), 0);
        assert_eq!(fetcher.request_count(), 1);
    }
}
