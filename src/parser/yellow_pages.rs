// Yellow Pages (yellowpages.co.za) HTML parsing
use crate::model::{ParserError, RawListing};
use crate::parser::ListingParser;
use crate::parser::data_island::{collect_strings, find_listing_array, json_ld_blocks, next_data, str_field};
use crate::utils::{clean_text, is_external_site, same_site_url};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

pub const BASE_URL: &str = "https://www.yellowpages.co.za";
pub const SELF_DOMAIN: &str = "yellowpages.co.za";

const NAME_KEYS: [&str; 3] = ["name", "businessName", "title"];
const PHONE_KEYS: [&str; 5] = ["phone", "phoneNumber", "phoneNumbers", "telephone", "tel"];
const ADDRESS_KEYS: [&str; 3] = ["formattedAddress", "fullAddress", "address"];
const CITY_KEYS: [&str; 4] = ["city", "town", "suburbOrCity", "addressLocality"];
const PROVINCE_KEYS: [&str; 3] = ["province", "region", "addressRegion"];
const WEBSITE_KEYS: [&str; 3] = ["website", "websiteUrl", "sameAs"];
const DETAIL_KEYS: [&str; 4] = ["detailUrl", "profileUrl", "permalink", "slug"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

static CARD: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#".listing, .business-listing, [class*="listing-card"], [class*="listing-item"]"#)
});
static CARD_NAME: LazyLock<Selector> = LazyLock::new(|| selector(r#"[class*="name"], h2, h3"#));
static CARD_PHONE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[class*="phone"], .telephone, a[href^="tel:"]"#));
static CARD_ADDRESS: LazyLock<Selector> = LazyLock::new(|| selector(r#"[class*="address"], .street"#));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static TEL_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href^="tel:"]"#));
static WEBSITE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"a[class*="website"][href], a[data-track*="website"][href], a[title*="ebsite"][href]"#)
});

/// Contact details found on a listing's own page.
#[derive(Debug, Default, PartialEq)]
pub struct ContactDetails {
    pub phone: Option<String>,
    pub website_url: Option<String>,
}

pub struct YellowPagesParser;

impl YellowPagesParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YellowPagesParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser for YellowPagesParser {
    fn parse(&self, html: &str) -> Result<Vec<RawListing>, ParserError> {
        let document = Html::parse_document(html);

        if let Some(data) = next_data(&document)? {
            if let Some(items) = find_listing_array(&data) {
                debug!("[yellow_pages] using data island ({} items)", items.len());
                return Ok(items.iter().map(listing_from_json).collect());
            }
        }

        Ok(document.select(&CARD).map(listing_from_card).collect())
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn listing_from_json(item: &Value) -> RawListing {
    // "address" is either a display string or a postal-address object.
    let (address, city, province) = match item.get("address") {
        Some(node @ Value::Object(_)) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "addressRegion"]
                .iter()
                .filter_map(|key| str_field(node, &[*key]))
                .collect();
            (
                Some(parts.join(", ")).filter(|a| !a.is_empty()),
                str_field(node, &CITY_KEYS),
                str_field(node, &PROVINCE_KEYS),
            )
        }
        _ => (str_field(item, &ADDRESS_KEYS), None, None),
    };

    let website_url = collect_strings(item, &WEBSITE_KEYS)
        .into_iter()
        .find(|url| is_external_site(url, SELF_DOMAIN));

    let detail_url = str_field(item, &DETAIL_KEYS).and_then(|href| {
        if href.starts_with('/') || href.starts_with("http") {
            same_site_url(BASE_URL, &href)
        } else {
            same_site_url(BASE_URL, &format!("/{}", href))
        }
    });

    RawListing {
        name: str_field(item, &NAME_KEYS),
        phone: str_field(item, &PHONE_KEYS),
        address,
        website_url,
        city: city.or_else(|| str_field(item, &CITY_KEYS)),
        province: province.or_else(|| str_field(item, &PROVINCE_KEYS)),
        detail_url,
    }
}

fn listing_from_card(card: ElementRef<'_>) -> RawListing {
    let first_text = |sel: &Selector| {
        card.select(sel)
            .next()
            .and_then(|element| clean_text(Some(&element_text(element))))
    };

    let phone = first_text(&CARD_PHONE).or_else(|| {
        card.select(&TEL_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| clean_text(Some(href.trim_start_matches("tel:"))))
    });

    let mut website_url = None;
    let mut detail_url = None;
    for link in card.select(&LINK) {
        let Some(href) = link.value().attr("href") else { continue };
        if website_url.is_none() && is_external_site(href, SELF_DOMAIN) {
            website_url = Some(href.trim().to_string());
        } else if detail_url.is_none() && !href.starts_with("tel:") && !href.starts_with("mailto:") {
            detail_url = same_site_url(BASE_URL, href);
        }
    }

    RawListing {
        name: first_text(&CARD_NAME),
        phone,
        address: first_text(&CARD_ADDRESS),
        website_url,
        city: None,
        province: None,
        detail_url,
    }
}

/// Pulls phone and website off a listing's detail page: data island first,
/// then JSON-LD, then markup.
pub fn parse_detail_page(html: &str) -> Result<ContactDetails, ParserError> {
    let document = Html::parse_document(html);
    let mut details = ContactDetails::default();

    let mut sources: Vec<Value> = Vec::new();
    if let Some(data) = next_data(&document)? {
        sources.push(data);
    }
    sources.extend(json_ld_blocks(&document));

    for source in &sources {
        if details.website_url.is_none() {
            details.website_url = collect_strings(source, &WEBSITE_KEYS)
                .into_iter()
                .find(|url| is_external_site(url, SELF_DOMAIN));
        }
        if details.phone.is_none() {
            details.phone = collect_strings(source, &PHONE_KEYS)
                .into_iter()
                .find(|p| !p.trim().is_empty());
        }
    }

    if details.phone.is_none() {
        details.phone = document
            .select(&TEL_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim_start_matches("tel:").trim().to_string())
            .filter(|p| !p.is_empty());
    }
    if details.website_url.is_none() {
        details.website_url = document
            .select(&WEBSITE_LINK)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| is_external_site(href, SELF_DOMAIN))
            .map(|href| href.trim().to_string());
    }

    Ok(details)
}
