// Parser module: per-source extraction of raw listings from fetched pages.

pub mod cipc;
pub mod data_island;
pub mod places;
pub mod yellow_pages;

use crate::model::{ParserError, RawListing};

pub trait ListingParser {
    fn parse(&self, body: &str) -> Result<Vec<RawListing>, ParserError>;
}
