// Utility functions
use rand::Rng;
use std::time::Duration;
use url::Url;

/// Hosts that are never treated as a business's own website.
pub const SOCIAL_HOSTS: [&str; 10] = [
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "wa.me",
    "whatsapp.com",
];

/// Converts a string to kebab-case.
pub fn to_kebab_case(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// "cape-town" / "cape town" -> "Cape Town".
pub fn titleize(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Trims and collapses internal whitespace; blank input becomes `None`.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let collapsed = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() { None } else { Some(collapsed) }
}

/// True only for an absolute URL whose scheme is http or https.
pub fn has_http_scheme(url: &str) -> bool {
    Url::parse(url.trim()).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

/// Prefixes `http://` when the URL carries no http(s) scheme.
pub fn ensure_scheme(url: &str) -> String {
    let url = url.trim();
    if has_http_scheme(url) {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// True for absolute http(s) URLs that point away from `self_domain` and are
/// not a social-media profile.
pub fn is_external_site(url: &str, self_domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    if host_matches(&host, self_domain) {
        return false;
    }
    !SOCIAL_HOSTS.iter().any(|social| host_matches(&host, social))
}

/// Resolves `href` against `base`, keeping only links that stay on `base`'s host.
pub fn same_site_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let joined = base.join(href.trim()).ok()?;
    match (joined.host_str(), base.host_str()) {
        (Some(a), Some(b)) if host_matches(a, b.trim_start_matches("www.")) => Some(joined.to_string()),
        _ => None,
    }
}

/// Base delay plus up to 25% random jitter. A zero base stays zero.
pub fn politeness_delay(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::rng().random_range(0..=base_ms / 4);
    Duration::from_millis(base_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_and_title_case() {
        assert_eq!(to_kebab_case("Cleaning  Service"), "cleaning-service");
        assert_eq!(titleize("cape-town"), "Cape Town");
        assert_eq!(titleize("PORT elizabeth"), "Port Elizabeth");
    }

    #[test]
    fn clean_text_drops_blanks() {
        assert_eq!(clean_text(Some("  021  555\n1234 ")), Some("021 555 1234".into()));
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn scheme_is_added_only_when_missing() {
        assert_eq!(ensure_scheme("example.co.za"), "http://example.co.za");
        assert_eq!(ensure_scheme("https://example.co.za"), "https://example.co.za");
        assert_eq!(ensure_scheme(" HTTPS://Example.co.za "), "HTTPS://Example.co.za");
    }

    #[test]
    fn domains_starting_with_http_still_get_a_scheme() {
        assert!(!has_http_scheme("httpsolutions.co.za"));
        assert_eq!(ensure_scheme("httpsolutions.co.za"), "http://httpsolutions.co.za");
        assert_eq!(ensure_scheme("http.co.za/about"), "http://http.co.za/about");
        assert_eq!(ensure_scheme("localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn external_site_excludes_self_and_social() {
        assert!(is_external_site("https://joesplumbing.co.za", "yellowpages.co.za"));
        assert!(!is_external_site("https://www.yellowpages.co.za/biz/1", "yellowpages.co.za"));
        assert!(!is_external_site("https://m.facebook.com/joes", "yellowpages.co.za"));
        assert!(!is_external_site("/relative/path", "yellowpages.co.za"));
        assert!(!is_external_site("mailto:joe@example.com", "yellowpages.co.za"));
    }

    #[test]
    fn same_site_url_resolves_relative_links() {
        let base = "https://www.yellowpages.co.za/search?what=plumber";
        assert_eq!(
            same_site_url(base, "/biz/joes-plumbing"),
            Some("https://www.yellowpages.co.za/biz/joes-plumbing".into())
        );
        assert_eq!(same_site_url(base, "https://joesplumbing.co.za"), None);
    }

    #[test]
    fn zero_delay_has_no_jitter() {
        assert_eq!(politeness_delay(Duration::ZERO), Duration::ZERO);
        let delay = politeness_delay(Duration::from_millis(400));
        assert!(delay >= Duration::from_millis(400) && delay <= Duration::from_millis(500));
    }
}
