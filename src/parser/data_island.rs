//! Structured JSON embedded in server-rendered pages: the framework's
//! `__NEXT_DATA__` island and schema.org JSON-LD blocks.

use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;

static NEXT_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script#__NEXT_DATA__").expect("valid data island selector"));
static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid json-ld selector")
});

/// Keys whose presence marks an object as a business listing.
const CONTACT_KEYS: [&str; 8] = [
    "phone",
    "phoneNumber",
    "telephone",
    "address",
    "formattedAddress",
    "website",
    "websiteUrl",
    "slug",
];

/// Parses the `__NEXT_DATA__` island. `Ok(None)` when the page has none.
pub fn next_data(document: &Html) -> Result<Option<Value>, serde_json::Error> {
    let Some(script) = document.select(&NEXT_DATA).next() else {
        return Ok(None);
    };
    let text = script.text().collect::<String>();
    serde_json::from_str(&text).map(Some)
}

/// Every JSON-LD block that parses; malformed blocks are skipped.
pub fn json_ld_blocks(document: &Html) -> Vec<Value> {
    document
        .select(&JSON_LD)
        .filter_map(|script| serde_json::from_str(&script.text().collect::<String>()).ok())
        .collect()
}

fn looks_like_listing(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.get("name").and_then(Value::as_str).is_some() && CONTACT_KEYS.iter().any(|k| obj.contains_key(*k))
    })
}

/// Depth-first search for the first array whose elements look like listings.
pub fn find_listing_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => {
            if !items.is_empty() && items.iter().any(looks_like_listing) {
                return Some(items);
            }
            items.iter().find_map(find_listing_array)
        }
        Value::Object(obj) => obj.values().find_map(find_listing_array),
        _ => None,
    }
}

/// First non-blank string found under any of `keys`. Arrays yield their first string.
pub fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Every string reachable under any of `keys`, anywhere in the tree.
pub fn collect_strings(value: &Value, keys: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    collect_into(value, keys, &mut found);
    found
}

fn collect_into(value: &Value, keys: &[&str], found: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            for (key, child) in obj {
                if keys.contains(&key.as_str()) {
                    match child {
                        Value::String(s) => found.push(s.clone()),
                        Value::Array(items) => {
                            found.extend(items.iter().filter_map(Value::as_str).map(str::to_string))
                        }
                        _ => {}
                    }
                }
                collect_into(child, keys, found);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_into(item, keys, found)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_nested_listing_array() {
        let data = json!({
            "props": { "pageProps": {
                "breadcrumbs": [{ "name": "Home", "href": "/" }],
                "results": { "listings": [
                    { "name": "Joe's Plumbing", "phone": "021 555 1234" },
                    { "name": "Drain Kings", "address": "Durban" }
                ]}
            }}
        });
        let listings = find_listing_array(&data).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(str_field(&listings[0], &["name"]).as_deref(), Some("Joe's Plumbing"));
    }

    #[test]
    fn str_field_takes_first_usable_key() {
        let obj = json!({ "phone": "  ", "phoneNumbers": ["", "011 222 3333"], "tel": 123 });
        assert_eq!(str_field(&obj, &["phone", "phoneNumbers"]).as_deref(), Some("011 222 3333"));
        assert_eq!(str_field(&obj, &["tel"]).as_deref(), Some("123"));
        assert_eq!(str_field(&obj, &["missing"]), None);
    }

    #[test]
    fn collects_strings_at_any_depth() {
        let data = json!({ "business": { "sameAs": ["https://fb.com/x", "https://joe.co.za"], "contact": { "website": "https://joe.co.za" } } });
        assert_eq!(
            collect_strings(&data, &["website", "sameAs"]),
            vec!["https://joe.co.za", "https://fb.com/x", "https://joe.co.za"]
        );
    }

    #[test]
    fn reads_island_and_json_ld_from_markup() {
        let html = r#"<html><head>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"x":1}}</script>
            <script type="application/ld+json">{"@type":"LocalBusiness","telephone":"021"}</script>
            <script type="application/ld+json">{ not json</script>
            </head></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(next_data(&doc).unwrap().unwrap()["props"]["x"], 1);
        assert_eq!(json_ld_blocks(&doc).len(), 1);
    }

    #[test]
    fn malformed_island_is_an_error() {
        let doc = Html::parse_document(r#"<script id="__NEXT_DATA__">{ broken</script>"#);
        assert!(next_data(&doc).is_err());
        assert!(next_data(&Html::parse_document("<p>plain</p>")).unwrap().is_none());
    }
}
