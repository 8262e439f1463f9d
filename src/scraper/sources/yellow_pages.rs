use crate::model::{ParserError, RawListing, ScrapeError, ScrapeQuery, Source};
use crate::parser::ListingParser;
use crate::parser::yellow_pages::{BASE_URL, YellowPagesParser, parse_detail_page};
use crate::scraper::pagination::{PagedSource, paginate};
use crate::scraper::{FetchRequest, ScraperContext, SourceScraper};
use crate::utils::{clean_text, politeness_delay, to_kebab_case};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

pub struct YellowPagesScraper {
    ctx: ScraperContext,
    query: ScrapeQuery,
    parser: YellowPagesParser,
}

impl YellowPagesScraper {
    pub fn new(ctx: ScraperContext, query: ScrapeQuery) -> Self {
        Self { ctx, query, parser: YellowPagesParser::new() }
    }

    fn search_url(&self) -> String {
        format!("{}/search", BASE_URL)
    }

    /// Fetches one detail page and fills whatever contact fields are missing.
    async fn fill_from_detail(&self, ctx: &ScraperContext, listing: &mut RawListing, url: &str) {
        let request = FetchRequest::get(url).html().timeout(ctx.config.request_timeout);
        let body = match ctx.fetcher.fetch(&request).await {
            Ok(response) => response.body,
            Err(e) => {
                debug!("[yellow_pages] Detail fetch failed for {}: {}", url, e);
                return;
            }
        };

        match parse_detail_page(&body) {
            Ok(details) => {
                if is_blank(&listing.phone) {
                    listing.phone = details.phone;
                }
                if is_blank(&listing.website_url) {
                    listing.website_url = details.website_url;
                }
            }
            Err(e) => debug!("[yellow_pages] Detail parse failed for {}: {}", url, e),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    clean_text(value.as_deref()).is_none()
}

#[async_trait]
impl PagedSource for YellowPagesScraper {
    fn source(&self) -> Source {
        Source::YellowPages
    }

    fn query(&self) -> &ScrapeQuery {
        &self.query
    }

    fn page_request(&self, page: u32) -> FetchRequest {
        FetchRequest::get(self.search_url())
            .query("what", to_kebab_case(&self.query.category))
            .query("where", to_kebab_case(&self.query.location))
            .query("page", page.to_string())
            .html()
            .timeout(self.ctx.config.request_timeout)
    }

    fn extract(&self, body: &str) -> Result<Vec<RawListing>, ParserError> {
        self.parser.parse(body)
    }

    async fn enrich(&self, ctx: &ScraperContext, mut listings: Vec<RawListing>) -> Vec<RawListing> {
        let mut fetched = 0;
        for listing in listings.iter_mut() {
            if !is_blank(&listing.phone) && !is_blank(&listing.website_url) {
                continue;
            }
            let Some(url) = listing.detail_url.clone() else { continue };

            if fetched > 0 {
                sleep(politeness_delay(ctx.config.detail_delay)).await;
            }
            fetched += 1;
            self.fill_from_detail(ctx, listing, &url).await;
        }
        debug!("[yellow_pages] Fetched {} detail pages", fetched);
        listings
    }
}

#[async_trait]
impl SourceScraper for YellowPagesScraper {
    fn source(&self) -> Source {
        Source::YellowPages
    }

    async fn scrape(&self) -> Result<usize, ScrapeError> {
        let report = paginate(&self.ctx, self).await?;
        info!(
            "[yellow_pages] {} in {}: {} new over {} pages ({:?})",
            self.query.category, self.query.location, report.created, report.pages_visited, report.stop
        );
        Ok(report.created)
    }
}
