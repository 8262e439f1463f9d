use crate::auditor::scoring::prospect_quality;
use crate::auditor::signals::inspect_page;
use crate::model::{AuditResult, AuditSignals, Business, StorageError};
use crate::scraper::{FetchRequest, Fetcher};
use crate::storage::SqliteStorage;
use crate::utils::ensure_scheme;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const AUDIT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ProspectorBot/1.0)";

/// Fetches a business's website and records how much work it needs.
pub struct WebsiteAuditor {
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<Mutex<SqliteStorage>>,
    timeout: Duration,
}

impl WebsiteAuditor {
    pub fn new(fetcher: Arc<dyn Fetcher>, storage: Arc<Mutex<SqliteStorage>>, timeout: Duration) -> Self {
        Self { fetcher, storage, timeout }
    }

    /// Audits and saves. `None` means the audit did not complete; the business
    /// keeps its `needs_audit` flag and is picked up by the next sweep.
    pub async fn audit(&self, business: &Business) -> Option<AuditResult> {
        match self.try_audit(business).await {
            Ok(result) => {
                info!(
                    "[auditor] {} scored {} ({} issues, {:?})",
                    business.name,
                    result.score,
                    result.issues.len(),
                    prospect_quality(business, Some(&result))
                );
                Some(result)
            }
            Err(e) => {
                warn!("[auditor] {}: {}", business.name, e);
                None
            }
        }
    }

    async fn try_audit(&self, business: &Business) -> Result<AuditResult, StorageError> {
        let signals = match business.website_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => self.inspect(url).await,
            _ => AuditSignals::no_website(),
        };

        self.storage
            .lock()
            .await
            .save_audit_result(business.id, &signals)
    }

    async fn inspect(&self, raw_url: &str) -> AuditSignals {
        let url = ensure_scheme(raw_url);
        let request = FetchRequest::get(&url)
            .header("user-agent", AUDIT_USER_AGENT)
            .timeout(self.timeout);

        let started = Instant::now();
        let response = self.fetcher.fetch(&request).await;
        let elapsed_ms = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);

        match response {
            Ok(response) => {
                debug!("[auditor] {} -> {} ({}) in {}ms", url, response.final_url, response.status, elapsed_ms);
                inspect_page(&response.body, &response.final_url, elapsed_ms)
            }
            Err(e) => {
                warn!("[auditor] Fetch failed for {}: {}", url, e);
                AuditSignals::unreachable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBusiness, Source};
    use crate::scraper::testing::ScriptedFetcher;

    fn setup(fetcher: ScriptedFetcher, website: Option<&str>) -> (WebsiteAuditor, Arc<ScriptedFetcher>, Arc<Mutex<SqliteStorage>>, Business) {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage
            .upsert_business(&NewBusiness {
                name: "Joe's Plumbing".into(),
                city: Some("Cape Town".into()),
                website_url: website.map(str::to_string),
                source: Source::YellowPages,
                ..NewBusiness::default()
            })
            .unwrap();
        let business = storage.find_business("Joe's Plumbing", Some("Cape Town")).unwrap().unwrap();

        let fetcher = Arc::new(fetcher);
        let storage = Arc::new(Mutex::new(storage));
        let auditor = WebsiteAuditor::new(fetcher.clone(), storage.clone(), Duration::from_secs(5));
        (auditor, fetcher, storage, business)
    }

    #[tokio::test]
    async fn no_website_is_scored_without_network() {
        let (auditor, fetcher, storage, business) = setup(ScriptedFetcher::new(), None);

        let result = auditor.audit(&business).await.unwrap();
        assert_eq!(result.score, 60);
        assert_eq!(result.issues, vec!["No website found", "No SSL/HTTPS", "Not mobile-friendly"]);
        assert!(!result.signals.has_website);
        assert_eq!(result.signals.cms_detected, None);
        assert_eq!(result.signals.load_time_ms, None);
        assert_eq!(fetcher.request_count(), 0);

        let stored = storage.lock().await.get_business(business.id).unwrap().unwrap();
        assert!(!stored.needs_audit);
    }

    #[tokio::test]
    async fn unreachable_site_is_recorded_as_degraded() {
        let fetcher = ScriptedFetcher::new().fail("joesplumbing", 503);
        let (auditor, fetcher, _storage, business) = setup(fetcher, Some("joesplumbing.co.za"));

        let result = auditor.audit(&business).await.unwrap();
        assert!(result.signals.has_website);
        assert!(!result.signals.has_ssl);
        assert_eq!(result.signals.cms_detected.as_deref(), Some("unreachable"));
        assert_eq!(result.signals.load_time_ms, None);
        assert_eq!(result.signals.copyright_year, None);
        assert_eq!(fetcher.requests(), vec!["http://joesplumbing.co.za/"]);
    }

    #[tokio::test]
    async fn bare_domain_starting_with_http_is_fetched() {
        let page = r#"<html><head><meta name="viewport" content="width=device-width"></head>
            <body><footer>© 2024 Http Solutions</footer></body></html>"#;
        let fetcher = ScriptedFetcher::new().on("httpsolutions.co.za", page);
        let (auditor, fetcher, _storage, business) = setup(fetcher, Some("httpsolutions.co.za"));

        let result = auditor.audit(&business).await.unwrap();
        assert_eq!(fetcher.requests(), vec!["http://httpsolutions.co.za/"]);
        assert_ne!(result.signals.cms_detected.as_deref(), Some("unreachable"));
        assert!(result.signals.is_mobile_friendly);
        assert_eq!(result.signals.copyright_year, Some(2024));
    }

    #[tokio::test]
    async fn ssl_follows_the_final_redirect_target() {
        let page = r#"<html><head><meta name="viewport" content="width=device-width"></head>
            <body><footer>© 2018 Joe's | powered by joomla</footer></body></html>"#;
        let fetcher = ScriptedFetcher::new().redirect("joesplumbing", "https://joesplumbing.co.za/", page);
        let (auditor, _fetcher, storage, business) = setup(fetcher, Some("http://joesplumbing.co.za"));

        let result = auditor.audit(&business).await.unwrap();
        assert!(result.signals.has_ssl);
        assert!(result.signals.is_mobile_friendly);
        assert_eq!(result.signals.cms_detected.as_deref(), Some("Joomla"));
        assert_eq!(result.signals.copyright_year, Some(2018));
        assert!(result.signals.load_time_ms.is_some());
        assert_eq!(result.score, 30);

        let stored = storage.lock().await.get_audit_result(business.id).unwrap().unwrap();
        assert_eq!(stored.score, result.score);
    }

    #[tokio::test]
    async fn storage_failure_yields_no_result_and_keeps_flag() {
        let (auditor, _fetcher, storage, business) = setup(ScriptedFetcher::new(), None);
        let ghost = Business { id: business.id + 100, ..business.clone() };

        assert!(auditor.audit(&ghost).await.is_none());
        let stored = storage.lock().await.get_business(business.id).unwrap().unwrap();
        assert!(stored.needs_audit);
    }
}
