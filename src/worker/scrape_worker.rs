use crate::config::ScraperConfig;
use crate::model::{ScrapeError, ScrapeJob, ScrapeQuery, StorageError};
use crate::scraper::ScraperContext;
use crate::worker::WorkerContext;
use tracing::{info, warn};

/// Runs one scrape job through its lifecycle: pending -> running -> completed
/// or failed. Errors are recorded on the job and then returned to the caller.
pub async fn run(ctx: &WorkerContext, job_id: i64, fetch_details: bool, max_pages: u32) -> Result<usize, ScrapeError> {
    let job = ctx
        .storage
        .lock()
        .await
        .get_scrape_job(job_id)?
        .ok_or(ScrapeError::JobNotFound(job_id))?;

    ctx.storage.lock().await.mark_job_running(job_id)?;
    info!("[job {}] Running {} for {:?} in {:?}", job_id, job.source, job.category, job.location);

    match execute(ctx, &job, fetch_details, max_pages).await {
        Ok(count) => {
            ctx.storage.lock().await.mark_job_completed(job_id, count)?;
            info!("[job {}] Completed with {} new businesses", job_id, count);
            Ok(count)
        }
        Err(e) => {
            match ctx.storage.lock().await.mark_job_failed(job_id, &e.to_string()) {
                Ok(_) | Err(StorageError::NotFound) => {}
                Err(mark_err) => warn!("[job {}] Could not mark failed: {}", job_id, mark_err),
            }
            Err(e)
        }
    }
}

async fn execute(ctx: &WorkerContext, job: &ScrapeJob, fetch_details: bool, max_pages: u32) -> Result<usize, ScrapeError> {
    let source = job.source()?;
    let settings = ctx.storage.lock().await.load_settings()?;

    let category = job
        .category
        .clone()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| settings.default_category.clone());
    let location = job
        .location
        .clone()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| settings.default_city.clone());
    let query = ScrapeQuery::new(category, location)
        .max_pages(max_pages)
        .fetch_details(fetch_details);

    let scraper_ctx = ScraperContext::new(
        ctx.fetcher.clone(),
        ctx.storage.clone(),
        ScraperConfig::resolve(&ctx.config, &settings),
    );
    let scraper = ctx.registry.build(source, scraper_ctx, query)?;
    scraper.scrape().await
}
