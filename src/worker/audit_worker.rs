use crate::auditor::WebsiteAuditor;
use crate::model::{AuditError, AuditResult};
use crate::worker::WorkerContext;
use tracing::warn;

/// Audits one business. `Ok(None)` means the audit ran but did not complete,
/// in which case the business stays queued for the next sweep.
pub async fn run(ctx: &WorkerContext, business_id: i64) -> Result<Option<AuditResult>, AuditError> {
    let business = ctx.storage.lock().await.get_business(business_id)?;
    let Some(business) = business else {
        warn!("[audit] Business {} no longer exists", business_id);
        return Err(AuditError::BusinessNotFound(business_id));
    };

    let auditor = WebsiteAuditor::new(ctx.fetcher.clone(), ctx.storage.clone(), ctx.config.audit_timeout());
    Ok(auditor.audit(&business).await)
}
