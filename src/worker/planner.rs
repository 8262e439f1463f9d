use crate::model::{PlanError, ScrapeJob, Source, StorageError};
use crate::storage::SqliteStorage;
use crate::worker::{JobQueue, WorkItem};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const SA_CITIES: [&str; 20] = [
    "Cape Town",
    "Johannesburg",
    "Pretoria",
    "Durban",
    "Port Elizabeth",
    "Bloemfontein",
    "East London",
    "Polokwane",
    "Nelspruit",
    "George",
    "Rustenburg",
    "Pietermaritzburg",
    "Kimberley",
    "Witbank",
    "Welkom",
    "Stellenbosch",
    "Paarl",
    "Knysna",
    "Mossel Bay",
    "Worcester",
];

/// Walk-in and call-in trades, the likeliest to need a new website.
pub const SMB_CATEGORIES: [&str; 30] = [
    "plumber",
    "electrician",
    "accountant",
    "attorney",
    "dentist",
    "doctor",
    "salon",
    "mechanic",
    "builder",
    "photographer",
    "florist",
    "bakery",
    "cleaning service",
    "landscaping",
    "pest control",
    "locksmith",
    "estate agent",
    "physiotherapist",
    "optometrist",
    "gym",
    "guesthouse",
    "catering",
    "wedding venue",
    "printer",
    "insurance broker",
    "pharmacist",
    "restaurant",
    "hardware store",
    "furniture store",
    "clothing store",
];

/// Grid used when a bulk sweep names no cities or categories.
pub const DEFAULT_BULK_CITIES: usize = 10;
pub const DEFAULT_BULK_CATEGORIES: usize = 15;
pub const DEFAULT_PAGES_PER_COMBO: u32 = 2;
pub const BULK_MAX_PAGES: u32 = 5;
pub const MAX_BULK_COMBOS: usize = 200;
pub const BACKFILL_MAX_PAGES: u32 = 3;

/// How deep a queued scrape job goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub fetch_details: bool,
    pub max_pages: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self { fetch_details: false, max_pages: 5 }
    }
}

fn enqueue_job(queue: &dyn JobQueue, job: &ScrapeJob, options: JobOptions) {
    let item = WorkItem::Scrape {
        job_id: job.id,
        fetch_details: options.fetch_details,
        max_pages: options.max_pages,
    };
    match queue.enqueue(item) {
        Ok(true) => {}
        Ok(false) => debug!("Job {} already queued", job.id),
        Err(e) => warn!("Job {} left pending: {}", job.id, e),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Creates and queues one job per requested source. An empty list means every
/// scrapeable source; unknown names are skipped.
pub async fn request_scrape(
    storage: &Mutex<SqliteStorage>,
    queue: &dyn JobQueue,
    sources: &[&str],
    category: Option<&str>,
    location: Option<&str>,
    options: JobOptions,
) -> Result<Vec<ScrapeJob>, StorageError> {
    let storage = storage.lock().await;
    let settings = storage.load_settings()?;

    let category = non_blank(category).unwrap_or(&settings.default_category);
    let location = non_blank(location).unwrap_or(&settings.default_city);

    let targets: Vec<Source> = if sources.is_empty() {
        Source::SCRAPEABLE.to_vec()
    } else {
        sources
            .iter()
            .filter_map(|name| match name.parse::<Source>() {
                Ok(source) if source.is_scrapeable() => Some(source),
                _ => {
                    warn!("Skipping unknown source {:?}", name);
                    None
                }
            })
            .collect()
    };

    let mut jobs = Vec::with_capacity(targets.len());
    for source in targets {
        let job = storage.create_scrape_job(source, Some(category), Some(location))?;
        enqueue_job(queue, &job, options);
        jobs.push(job);
    }
    Ok(jobs)
}

fn pick<'a>(given: &'a [String], defaults: &[&'a str], default_len: usize, cap: usize) -> Vec<&'a str> {
    let given: Vec<&str> = given.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect();
    if given.is_empty() {
        defaults.iter().copied().take(default_len).collect()
    } else {
        given.into_iter().take(cap).collect()
    }
}

/// Queues a Yellow Pages job for every city x category pair, staggered.
/// Grids over [`MAX_BULK_COMBOS`] are refused before anything is queued.
/// Returns how many jobs were queued.
pub async fn bulk_scrape(
    storage: &Mutex<SqliteStorage>,
    queue: &dyn JobQueue,
    cities: &[String],
    categories: &[String],
    pages_per_combo: Option<u32>,
    stagger: Duration,
) -> Result<usize, PlanError> {
    let cities = pick(cities, &SA_CITIES, DEFAULT_BULK_CITIES, SA_CITIES.len());
    let categories = pick(categories, &SMB_CATEGORIES, DEFAULT_BULK_CATEGORIES, SMB_CATEGORIES.len());

    let combos = cities.len() * categories.len();
    if combos > MAX_BULK_COMBOS {
        return Err(PlanError::TooManyCombinations { combos, max: MAX_BULK_COMBOS });
    }

    let options = JobOptions {
        fetch_details: false,
        max_pages: pages_per_combo.unwrap_or(DEFAULT_PAGES_PER_COMBO).clamp(1, BULK_MAX_PAGES),
    };
    info!("Bulk sweep: {} city x category combinations", combos);

    let mut queued = 0;
    for city in &cities {
        for category in &categories {
            if queued > 0 {
                sleep(stagger).await;
            }
            let job = storage
                .lock()
                .await
                .create_scrape_job(Source::YellowPages, Some(*category), Some(*city))?;
            enqueue_job(queue, &job, options);
            queued += 1;
        }
    }

    info!("Bulk sweep queued {} jobs", queued);
    Ok(queued)
}

/// Re-scrapes, with detail pages, every (category, city) whose Yellow Pages
/// businesses are still missing a phone number.
pub async fn backfill_contacts(storage: &Mutex<SqliteStorage>, queue: &dyn JobQueue) -> Result<usize, StorageError> {
    let storage = storage.lock().await;
    let combos = storage.backfill_combos(Source::YellowPages)?;
    let options = JobOptions { fetch_details: true, max_pages: BACKFILL_MAX_PAGES };

    for (category, city) in &combos {
        let job = storage.create_scrape_job(Source::YellowPages, Some(category.as_str()), Some(city.as_str()))?;
        enqueue_job(queue, &job, options);
    }

    info!("Backfill queued {} jobs", combos.len());
    Ok(combos.len())
}

/// Queues audits for flagged businesses. Audits already in flight are left alone.
pub async fn enqueue_pending_audits(
    storage: &Mutex<SqliteStorage>,
    queue: &dyn JobQueue,
    limit: usize,
) -> Result<usize, StorageError> {
    let pending = storage.lock().await.businesses_needing_audit(limit)?;
    let mut queued = 0;
    for business in &pending {
        match queue.enqueue(WorkItem::Audit { business_id: business.id }) {
            Ok(true) => queued += 1,
            Ok(false) => {}
            Err(e) => warn!("Audit of {} not queued: {}", business.name, e),
        }
    }
    Ok(queued)
}
