//! Google Places text-search and details payloads.

use crate::model::{ParserError, RawListing};
use serde::Deserialize;

pub const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
pub const DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";
pub const DETAIL_FIELDS: &str = "formatted_phone_number,website";

pub const STATUS_OK: &str = "OK";

#[derive(Debug, Deserialize)]
pub struct TextSearchResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<PlaceSummary>,
    pub next_page_token: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub status: String,
    pub result: Option<PlaceDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaceDetails {
    pub formatted_phone_number: Option<String>,
    pub website: Option<String>,
}

impl TextSearchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

pub fn parse_text_search(body: &str) -> Result<TextSearchResponse, ParserError> {
    Ok(serde_json::from_str(body)?)
}

/// Details for one place. A non-OK status counts as "no details".
pub fn parse_details(body: &str) -> Result<PlaceDetails, ParserError> {
    let response: DetailsResponse = serde_json::from_str(body)?;
    if response.status != STATUS_OK {
        return Err(ParserError::MissingField(format!("details status {}", response.status)));
    }
    response
        .result
        .ok_or_else(|| ParserError::MissingField("result".to_string()))
}

/// Folds a search hit and its details into a listing.
pub fn to_listing(place: &PlaceSummary, details: PlaceDetails) -> RawListing {
    RawListing {
        name: place.name.clone(),
        phone: details.formatted_phone_number,
        address: place.formatted_address.clone(),
        website_url: details.website,
        ..RawListing::default()
    }
}
