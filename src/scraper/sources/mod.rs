// One scraper per directory source.

pub mod brabys;
pub mod cipc;
pub mod google_places;
pub mod yellow_pages;

pub use brabys::BrabysScraper;
pub use cipc::CipcScraper;
pub use google_places::GooglePlacesScraper;
pub use yellow_pages::YellowPagesScraper;
