use crate::model::{NewBusiness, RawListing, ScrapeQuery, Source};
use crate::utils::{clean_text, has_http_scheme, titleize};
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

pub const PROVINCES: [&str; 9] = [
    "Western Cape",
    "Eastern Cape",
    "Northern Cape",
    "Gauteng",
    "KwaZulu-Natal",
    "Free State",
    "Limpopo",
    "Mpumalanga",
    "North West",
];

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\b\d{4}\s*$").expect("valid postal code regex"));

#[derive(Debug, Default, PartialEq)]
pub struct AddressParts {
    pub city: Option<String>,
    pub province: Option<String>,
}

pub fn normalize_all(listings: Vec<RawListing>, query: &ScrapeQuery, source: Source) -> Vec<NewBusiness> {
    listings
        .into_iter()
        .filter_map(|listing| normalize_listing(listing, query, source))
        .collect()
}

/// Turns a raw listing into an upsert-ready record. Listings without a name are dropped.
pub fn normalize_listing(listing: RawListing, query: &ScrapeQuery, source: Source) -> Option<NewBusiness> {
    let name = clean_text(listing.name.as_deref())?;
    let address = clean_text(listing.address.as_deref());
    let parsed = address.as_deref().map(split_address).unwrap_or_default();

    // Structured fields from the page win over positional splitting.
    let city = clean_text(listing.city.as_deref())
        .or(parsed.city)
        .or_else(|| fallback_city(&query.location));
    let province = clean_text(listing.province.as_deref())
        .and_then(|p| canonical_province(&p).map(str::to_string).or(Some(p)))
        .or(parsed.province);

    let website_url = clean_text(listing.website_url.as_deref()).filter(|url| has_http_scheme(url));

    Some(NewBusiness {
        name,
        category: clean_text(Some(&query.category)),
        phone: clean_text(listing.phone.as_deref()),
        email: None,
        address,
        city,
        province,
        website_url,
        source,
        scraped_at: Some(Utc::now()),
    })
}

fn fallback_city(location: &str) -> Option<String> {
    let city = titleize(location);
    if city.is_empty() { None } else { Some(city) }
}

fn strip_postal_code(segment: &str) -> &str {
    match POSTAL_CODE.find(segment) {
        Some(m) => segment[..m.start()].trim(),
        None => segment.trim(),
    }
}

fn canonical_province(segment: &str) -> Option<&'static str> {
    let candidate = strip_postal_code(segment);
    PROVINCES.iter().copied().find(|p| {
        p.eq_ignore_ascii_case(candidate) || p.replace('-', " ").eq_ignore_ascii_case(candidate)
    })
}

/// Best-effort split of a comma-joined address such as
/// "12 Long St, Gardens, Cape Town, Western Cape, 8001".
///
/// The last segment naming a known province sets the province, and the
/// segment right before it is taken as the city. Without a recognizable
/// province nothing is inferred.
pub fn split_address(address: &str) -> AddressParts {
    let segments: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let Some(idx) = segments.iter().rposition(|s| canonical_province(s).is_some()) else {
        return AddressParts::default();
    };

    let province = canonical_province(segments[idx]).map(str::to_string);
    let city = idx
        .checked_sub(1)
        .map(|i| strip_postal_code(segments[i]))
        .filter(|c| !c.is_empty() && !c.starts_with(|ch: char| ch.is_ascii_digit()))
        .map(str::to_string);

    AddressParts { city, province }
}
