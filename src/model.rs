// Core structs: Business, AuditResult, ScrapeJob and the error taxonomy
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Where a business record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    YellowPages,
    Brabys,
    GooglePlaces,
    Cipc,
    #[default]
    Manual,
}

impl Source {
    /// Sources a scrape job may target. `Manual` is only ever entered by hand.
    pub const SCRAPEABLE: [Source; 4] = [
        Source::YellowPages,
        Source::Brabys,
        Source::GooglePlaces,
        Source::Cipc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::YellowPages => "yellow_pages",
            Source::Brabys => "brabys",
            Source::GooglePlaces => "google_places",
            Source::Cipc => "cipc",
            Source::Manual => "manual",
        }
    }

    pub fn is_scrapeable(&self) -> bool {
        !matches!(self, Source::Manual)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "yellow_pages" => Ok(Source::YellowPages),
            "brabys" => Ok(Source::Brabys),
            "google_places" => Ok(Source::GooglePlaces),
            "cipc" => Ok(Source::Cipc),
            "manual" => Ok(Source::Manual),
            other => Err(UnknownVariant::new("source", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// The only legal moves are pending -> running -> {completed, failed}.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownVariant::new("status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Business {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub website_url: Option<String>,
    pub source: Source,
    pub needs_audit: bool,
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn has_website(&self) -> bool {
        self.website_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

/// A normalized record ready for the upsert store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBusiness {
    pub name: String,
    pub category: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub website_url: Option<String>,
    pub source: Source,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// A listing as it comes off a directory page, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub detail_url: Option<String>,
}

/// One scraping query: what to look for, where, and how far to page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeQuery {
    pub category: String,
    pub location: String,
    pub max_pages: u32,
    pub fetch_details: bool,
}

impl ScrapeQuery {
    pub fn new(category: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            location: location.into(),
            max_pages: 5,
            fetch_details: false,
        }
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn fetch_details(mut self, fetch_details: bool) -> Self {
        self.fetch_details = fetch_details;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Backfilled,
    Unchanged,
}

/// Raw signals derived from a website fetch. The score is computed from these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSignals {
    pub has_website: bool,
    pub has_ssl: bool,
    pub is_mobile_friendly: bool,
    pub cms_detected: Option<String>,
    pub load_time_ms: Option<u32>,
    pub copyright_year: Option<i32>,
}

impl AuditSignals {
    pub const UNREACHABLE: &'static str = "unreachable";

    pub fn no_website() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            has_website: true,
            cms_detected: Some(Self::UNREACHABLE.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub business_id: i64,
    #[serde(flatten)]
    pub signals: AuditSignals,
    pub score: u8,
    pub issues: Vec<String>,
    pub audited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeJob {
    pub id: i64,
    /// Stored verbatim; resolved to a [`Source`] when the job runs.
    pub source: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: JobStatus,
    pub results_count: i64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScrapeJob {
    pub fn source(&self) -> Result<Source, UnknownVariant> {
        self.source.parse()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        let (started, completed) = (self.started_at?, self.completed_at?);
        let millis = (completed - started).num_milliseconds();
        Some((millis as f64 / 1000.0).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectQuality {
    NoWebsite,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BusinessStats {
    pub total: usize,
    pub no_website: usize,
    pub needs_audit: usize,
    pub audited: usize,
    pub high_prospects: usize,
    pub medium_prospects: usize,
    pub sources: Vec<(String, usize)>,
    pub cities: Vec<(String, usize)>,
}

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::HttpError(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("json parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("missing field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("record not found")]
    NotFound,
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("unknown setting key: {0}")]
    UnknownSetting(String),
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    UnknownSource(#[from] UnknownVariant),
    #[error("scrape job {0} not found")]
    JobNotFound(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("business {0} not found")]
    BusinessNotFound(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("too many combinations ({combos}, max {max})")]
    TooManyCombinations { combos: usize, max: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
#[error("work queue is closed")]
pub struct QueueClosed;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
