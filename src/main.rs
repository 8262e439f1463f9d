mod auditor;
mod config;
mod model;
mod normalizer;
mod parser;
mod scraper;
mod storage;
mod utils;
mod worker;

use crate::config::{AppConfig, SettingKey, load_config};
use crate::scraper::{Fetcher, HttpFetcher, ScraperRegistry};
use crate::storage::SqliteStorage;
use crate::worker::planner::{self, JobOptions};
use crate::worker::{Dispatcher, WorkerContext};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic occurred: {}", panic_info);
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args.first().map(String::as_str).unwrap_or("config.json");

    // Load configuration from file
    let config: Arc<AppConfig> = match load_config(config_path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    // Initialize storage (SQLite) with async access (wrapped in a Mutex)
    let storage = match SqliteStorage::new(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            return;
        }
    };
    if let Err(e) = storage.seed_default_settings() {
        error!("Failed to seed settings: {}", e);
        return;
    }

    // `prospector <config> get <key>` / `prospector <config> set <key> <value>`
    if let Some(command) = args.get(1) {
        run_settings_command(&storage, command, &args[2..]);
        return;
    }
    let storage = Arc::new(Mutex::new(storage));

    let fetcher: Arc<dyn Fetcher> = match HttpFetcher::new(&config.user_agent, config.request_timeout()) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    let registry = Arc::new(ScraperRegistry::with_defaults());
    info!("Registered sources: {:?}", registry.sources());

    let ctx = WorkerContext::new(storage.clone(), fetcher, registry, config.clone());
    let (dispatcher, handles) = Dispatcher::start(ctx, config.workers);

    if let Some(bulk) = &config.bulk {
        info!("Running startup bulk sweep...");
        match planner::bulk_scrape(
            &storage,
            &dispatcher,
            &bulk.cities,
            &bulk.categories,
            bulk.pages_per_combo,
            config.bulk_stagger(),
        )
        .await
        {
            Ok(queued) => info!("Bulk sweep: {} jobs queued", queued),
            Err(e) => warn!("Bulk sweep failed: {}", e),
        }
    }

    // Main processing loop
    loop {
        run_sweep(&config, &storage, &dispatcher).await;

        info!("Waiting for timer ({}s) or Ctrl-C...", config.check_interval_seconds);
        tokio::select! {
            _ = sleep(Duration::from_secs(config.check_interval_seconds)) => {
                info!("Timer triggered.");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, draining queue...");
                break;
            }
        }
    }

    drop(dispatcher);
    join_all(handles).await;
    info!("All workers stopped.");
}

/// One pass: queue configured queries, optional backfill, pending audits,
/// then log where things stand.
async fn run_sweep(config: &AppConfig, storage: &Mutex<SqliteStorage>, queue: &Dispatcher) {
    let settings = match storage.lock().await.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Could not load settings: {}", e);
            return;
        }
    };
    info!(
        "Sweep: {} queries over {:?} (audit concurrency {})",
        config.sweep.queries.len(),
        settings.enabled_sources,
        settings.audit_concurrency
    );

    let options = JobOptions {
        fetch_details: config.sweep.fetch_details,
        max_pages: config.sweep.max_pages,
    };
    let sources: Vec<&str> = settings.enabled_sources.iter().map(|s| s.as_str()).collect();

    if sources.is_empty() {
        warn!("No sources enabled, skipping configured queries");
    } else {
        for query in &config.sweep.queries {
            match planner::request_scrape(
                storage,
                queue,
                &sources,
                Some(query.category.as_str()),
                Some(query.location.as_str()),
                options,
            )
            .await
            {
                Ok(jobs) => info!("Queued {} jobs for {} in {}", jobs.len(), query.category, query.location),
                Err(e) => warn!("Could not queue {} in {}: {}", query.category, query.location, e),
            }
        }
    }

    if config.sweep.backfill {
        if let Err(e) = planner::backfill_contacts(storage, queue).await {
            warn!("Backfill sweep failed: {}", e);
        }
    }

    match planner::enqueue_pending_audits(storage, queue, config.audit_batch).await {
        Ok(queued) => info!("Queued {} audits", queued),
        Err(e) => warn!("Audit sweep failed: {}", e),
    }

    log_status(storage).await;
}

async fn log_status(storage: &Mutex<SqliteStorage>) {
    let storage = storage.lock().await;

    match storage.stats() {
        Ok(stats) => {
            info!(
                "Businesses: {} total | {} without website | {} awaiting audit | {} audited ({} high, {} medium)",
                stats.total,
                stats.no_website,
                stats.needs_audit,
                stats.audited,
                stats.high_prospects,
                stats.medium_prospects
            );
            info!("By source: {:?}", stats.sources);
            info!("Top cities: {:?}", stats.cities);
        }
        Err(e) => warn!("Stats unavailable: {}", e),
    }

    match storage.recent_scrape_jobs(5) {
        Ok(jobs) => {
            for job in jobs {
                info!(
                    "Job {} [{}] {} {:?}/{:?}: {} new{}{}",
                    job.id,
                    job.status,
                    job.source,
                    job.category,
                    job.location,
                    job.results_count,
                    job.duration_seconds().map(|s| format!(" in {}s", s)).unwrap_or_default(),
                    job.error_message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default()
                );
            }
        }
        Err(e) => warn!("Recent jobs unavailable: {}", e),
    }
}

fn run_settings_command(storage: &SqliteStorage, command: &str, rest: &[String]) {
    match (command, rest) {
        ("get", [key]) => match key.parse::<SettingKey>() {
            Ok(key) => match storage.get_setting(key) {
                Ok(value) => println!("{} = {}", key.as_str(), value),
                Err(e) => error!("Could not read {}: {}", key.as_str(), e),
            },
            Err(key) => error!("Unknown setting key: {}", key),
        },
        ("set", [key, value]) => match storage.set_setting(key, value) {
            Ok(()) => info!("{} updated", key),
            Err(e) => error!("Could not set {}: {}", key, e),
        },
        _ => error!("Usage: prospector [config.json] [get <key> | set <key> <value>]"),
    }
}
