//! `TENANT_SYNC`: fan a tenant out into one `LISTING_SYNC` job per stale listing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::jobs::error::{JobError, StoreError};
use crate::jobs::handlers::JobHandler;
use crate::jobs::locks::{check_cooldown, CooldownWindow};
use crate::jobs::model::{Job, JobPayload, JobPriority, NewJob};
use crate::jobs::store::JobStore;
use crate::sync::store::TenantStore;

/// Listings considered per pass. Oldest-first ordering means the rest get their turn next pass.
pub const MAX_LISTINGS_PER_PASS: i64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub considered: usize,
    pub enqueued: usize,
    pub skipped_cooldown: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantSyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tenant sync timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<TenantSyncError> for JobError {
    fn from(err: TenantSyncError) -> Self {
        let message = err.to_string();
        match err {
            TenantSyncError::Store(e) => e.into(),
            TenantSyncError::Timeout(_) => JobError::new("TIMEOUT", message),
        }
    }
}

#[derive(Clone)]
pub struct TenantSyncOrchestrator {
    jobs: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantStore>,
    timeout: Option<Duration>,
}

impl TenantSyncOrchestrator {
    pub fn new(jobs: Arc<dyn JobStore>, tenants: Arc<dyn TenantStore>) -> Self {
        Self {
            jobs,
            tenants,
            timeout: None,
        }
    }

    /// Bounds each pass. A pass that runs out of time is recorded on the
    /// tenant row like any other failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one pass and records the outcome on the tenant row. On failure the
    /// tenant is marked `error` and the original error is returned.
    ///
    /// Child jobs are enqueued one by one with no surrounding transaction; a
    /// pass that dies halfway leaves the already-enqueued children in place.
    pub async fn sync_tenant(&self, tenant_id: &str) -> Result<FanOutSummary, TenantSyncError> {
        let result = match self.timeout {
            Some(limit) => match timeout(limit, self.pass(tenant_id)).await {
                Ok(res) => res.map_err(TenantSyncError::from),
                Err(_) => Err(TenantSyncError::Timeout(limit)),
            },
            None => self.pass(tenant_id).await.map_err(TenantSyncError::from),
        };

        match result {
            Ok(summary) => Ok(summary),
            Err(err) => {
                if let Err(mark_err) = self
                    .tenants
                    .mark_sync_error(tenant_id, &err.to_string())
                    .await
                {
                    warn!(tenant_id, error = %mark_err, "could not record tenant sync failure");
                }
                Err(err)
            }
        }
    }

    async fn pass(&self, tenant_id: &str) -> Result<FanOutSummary, StoreError> {
        self.tenants.mark_sync_running(tenant_id).await?;

        let listings = self
            .tenants
            .listings_for_sync(tenant_id, MAX_LISTINGS_PER_PASS)
            .await?;

        let now = Utc::now();
        let mut summary = FanOutSummary {
            considered: listings.len(),
            ..FanOutSummary::default()
        };

        for listing in &listings {
            let cooldown = check_cooldown(CooldownWindow::ListingSync, listing.last_synced_at, now);
            if cooldown.in_cooldown {
                debug!(
                    tenant_id,
                    listing_id = %listing.id,
                    retry_after_seconds = cooldown.retry_after_seconds,
                    "listing in cooldown"
                );
                summary.skipped_cooldown += 1;
                continue;
            }

            self.jobs
                .enqueue(NewJob::listing_sync(
                    tenant_id,
                    &listing.id,
                    &listing.external_id,
                    JobPriority::Interactive,
                ))
                .await?;
            summary.enqueued += 1;
        }

        self.tenants.mark_sync_success(tenant_id).await?;
        Ok(summary)
    }
}

#[async_trait]
impl JobHandler for TenantSyncOrchestrator {
    async fn run(&self, job: &Job, payload: JobPayload) -> Result<(), JobError> {
        let payload = match payload {
            JobPayload::TenantSync(p) => p,
            other => {
                return Err(JobError::bad_payload(format!(
                    "expected TENANT_SYNC payload, got {}",
                    other.job_type()
                )))
            }
        };

        let summary = self.sync_tenant(&job.tenant_id).await?;
        info!(
            tenant_id = %job.tenant_id,
            trigger = ?payload.trigger,
            considered = summary.considered,
            enqueued = summary.enqueued,
            skipped_cooldown = summary.skipped_cooldown,
            "tenant sync fan-out done"
        );
        Ok(())
    }
}
