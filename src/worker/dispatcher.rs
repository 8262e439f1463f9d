use crate::model::QueueClosed;
use crate::worker::{WorkerContext, audit_worker, scrape_worker};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A unit of work for the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Scrape { job_id: i64, fetch_details: bool, max_pages: u32 },
    Audit { business_id: i64 },
}

pub trait JobQueue: Send + Sync {
    /// `Ok(false)` means an identical item is already waiting or running.
    fn enqueue(&self, item: WorkItem) -> Result<bool, QueueClosed>;
}

/// Businesses whose audit is queued or running.
#[derive(Clone, Default)]
struct InFlightAudits(Arc<std::sync::Mutex<HashSet<i64>>>);

impl InFlightAudits {
    fn claim(&self, business_id: i64) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).insert(business_id)
    }

    fn release(&self, business_id: i64) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).remove(&business_id);
    }
}

/// In-process queue drained by a fixed pool of worker tasks. Dropping the
/// dispatcher closes the queue; workers finish what is queued and exit.
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<WorkItem>,
    audits: InFlightAudits,
}

impl Dispatcher {
    pub fn start(ctx: WorkerContext, workers: usize) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let audits = InFlightAudits::default();

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(worker_id, ctx.clone(), receiver.clone(), audits.clone()))
            })
            .collect();

        info!("Dispatcher started with {} workers", workers.max(1));
        (Self { sender, audits }, handles)
    }
}

impl JobQueue for Dispatcher {
    fn enqueue(&self, item: WorkItem) -> Result<bool, QueueClosed> {
        if let WorkItem::Audit { business_id } = item {
            if !self.audits.claim(business_id) {
                debug!("Audit of business {} already queued", business_id);
                return Ok(false);
            }
        }

        self.sender.send(item).map(|_| true).map_err(|e| {
            if let WorkItem::Audit { business_id } = e.0 {
                self.audits.release(business_id);
            }
            QueueClosed
        })
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: WorkerContext,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    audits: InFlightAudits,
) {
    loop {
        let item = receiver.lock().await.recv().await;
        let Some(item) = item else { break };
        debug!("[worker {}] Picked up {:?}", worker_id, item);
        execute(&ctx, item.clone()).await;
        if let WorkItem::Audit { business_id } = item {
            audits.release(business_id);
        }
    }
    debug!("[worker {}] Queue closed, exiting", worker_id);
}

/// Runs one item. Failures end here, logged, so one bad job never stops a worker.
pub async fn execute(ctx: &WorkerContext, item: WorkItem) {
    match item {
        WorkItem::Scrape { job_id, fetch_details, max_pages } => {
            if let Err(e) = scrape_worker::run(ctx, job_id, fetch_details, max_pages).await {
                error!("Scrape job {} failed: {}", job_id, e);
            }
        }
        WorkItem::Audit { business_id } => {
            if let Err(e) = audit_worker::run(ctx, business_id).await {
                warn!("Audit of business {} failed: {}", business_id, e);
            }
        }
    }
}
