// Structural signals read off a fetched page
use crate::model::AuditSignals;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Markup/URL fingerprints, checked in order; first match wins.
pub const CMS_FINGERPRINTS: [(&str, &str); 8] = [
    ("wp-content", "WordPress"),
    ("joomla", "Joomla"),
    ("drupal", "Drupal"),
    ("wp-includes", "WordPress"),
    ("/sites/default", "Drupal"),
    ("blogger.com", "Blogger"),
    ("weebly.com", "Weebly"),
    ("wix.com", "Wix"),
];

static VIEWPORT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="viewport"]"#).expect("valid viewport selector"));
static FOOTER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"footer, #footer, .footer, [class*="footer"]"#).expect("valid footer selector")
});
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid body selector"));
static COPYRIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"©\s*(\d{4})").expect("valid copyright regex"));

/// Derives every signal for a page that was fetched successfully.
pub fn inspect_page(html: &str, final_url: &str, load_time_ms: u32) -> AuditSignals {
    let document = Html::parse_document(html);

    AuditSignals {
        has_website: true,
        has_ssl: uses_ssl(final_url),
        is_mobile_friendly: is_mobile_friendly(&document),
        cms_detected: detect_cms(html).map(str::to_string),
        load_time_ms: Some(load_time_ms),
        copyright_year: extract_copyright_year(&document),
    }
}

pub fn uses_ssl(final_url: &str) -> bool {
    Url::parse(final_url).is_ok_and(|url| url.scheme() == "https")
}

pub fn is_mobile_friendly(document: &Html) -> bool {
    document
        .select(&VIEWPORT)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .is_some_and(|content| content.to_lowercase().contains("width=device-width"))
}

pub fn detect_cms(html: &str) -> Option<&'static str> {
    let lower = html.to_lowercase();
    CMS_FINGERPRINTS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, name)| *name)
}

pub fn extract_copyright_year(document: &Html) -> Option<i32> {
    let footer_text = document
        .select(&FOOTER)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");

    let text = if footer_text.trim().is_empty() {
        document.select(&BODY).next()?.text().collect::<String>()
    } else {
        footer_text
    };

    COPYRIGHT.captures(&text)?.get(1)?.as_str().parse().ok()
}
