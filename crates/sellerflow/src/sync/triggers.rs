//! Entry points that decide whether a sync request becomes a job.
//! Used by the HTTP routes (manual) and the cron command (auto).

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::jobs::error::StoreError;
use crate::jobs::locks::{
    check_cooldown, check_listing_sync_cooldown, check_manual_sync_cooldown, CooldownStatus,
    CooldownWindow,
};
use crate::jobs::model::{JobPriority, NewJob, SyncTrigger};
use crate::jobs::store::JobStore;
use crate::sync::store::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Enqueued { job_id: Uuid },
    Cooldown { retry_after_seconds: i64 },
}

impl TriggerOutcome {
    fn cooldown(status: CooldownStatus) -> Self {
        TriggerOutcome::Cooldown {
            retry_after_seconds: status.retry_after_seconds.unwrap_or(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("listing not found: {0}")]
    ListingNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SyncTriggers {
    jobs: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantStore>,
}

impl SyncTriggers {
    pub fn new(jobs: Arc<dyn JobStore>, tenants: Arc<dyn TenantStore>) -> Self {
        Self { jobs, tenants }
    }

    /// User pressed "sync now". Enforces the manual-sync cooldown.
    pub async fn request_manual_sync(&self, tenant_id: &str) -> Result<TriggerOutcome, TriggerError> {
        let tenant = self
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| TriggerError::TenantNotFound(tenant_id.to_string()))?;

        let now = Utc::now();
        let cooldown = check_cooldown(CooldownWindow::ManualSync, tenant.last_manual_sync_at, now);
        if cooldown.in_cooldown {
            debug!(tenant_id, retry_after_seconds = cooldown.retry_after_seconds, "manual sync rejected");
            return Ok(TriggerOutcome::cooldown(cooldown));
        }

        // The window is claimed before the enqueue: of two concurrent requests only
        // one gets a job. A failed enqueue below leaves the window claimed.
        let window_start = now - CooldownWindow::ManualSync.duration();
        if !self
            .tenants
            .claim_sync_request(tenant_id, SyncTrigger::Manual, window_start)
            .await?
        {
            return self.manual_sync_lost_race(tenant_id).await;
        }

        let job_id = self
            .jobs
            .enqueue(NewJob::tenant_sync(
                tenant_id,
                JobPriority::Interactive,
                SyncTrigger::Manual,
            ))
            .await?;

        info!(tenant_id, %job_id, "manual tenant sync enqueued");
        Ok(TriggerOutcome::Enqueued { job_id })
    }

    async fn manual_sync_lost_race(&self, tenant_id: &str) -> Result<TriggerOutcome, TriggerError> {
        let tenant = self
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| TriggerError::TenantNotFound(tenant_id.to_string()))?;

        debug!(tenant_id, "manual sync window claimed concurrently");
        Ok(TriggerOutcome::cooldown(check_manual_sync_cooldown(
            tenant.last_manual_sync_at,
        )))
    }

    /// User asked to refresh a single listing. Enforces the listing cooldown.
    pub async fn request_listing_sync(
        &self,
        tenant_id: &str,
        listing_id: &str,
    ) -> Result<TriggerOutcome, TriggerError> {
        let listing = self
            .tenants
            .get_listing(tenant_id, listing_id)
            .await?
            .filter(|l| l.is_active())
            .ok_or_else(|| TriggerError::ListingNotFound(listing_id.to_string()))?;

        let cooldown = check_listing_sync_cooldown(listing.last_synced_at);
        if cooldown.in_cooldown {
            return Ok(TriggerOutcome::cooldown(cooldown));
        }

        let job_id = self
            .jobs
            .enqueue(NewJob::listing_sync(
                tenant_id,
                &listing.id,
                &listing.external_id,
                JobPriority::Interactive,
            ))
            .await?;

        info!(tenant_id, listing_id, %job_id, "listing sync enqueued");
        Ok(TriggerOutcome::Enqueued { job_id })
    }

    /// Cron entry point: one background `TENANT_SYNC` per tenant whose
    /// auto-sync window has elapsed. Returns how many were enqueued.
    pub async fn enqueue_due_auto_syncs(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let window_start = now - CooldownWindow::AutoSync.duration();
        let mut enqueued = 0;
        for tenant in self.tenants.list_tenants().await? {
            if check_cooldown(CooldownWindow::AutoSync, tenant.last_auto_sync_at, now).in_cooldown {
                continue;
            }
            // another cron run got there first
            if !self
                .tenants
                .claim_sync_request(&tenant.id, SyncTrigger::Auto, window_start)
                .await?
            {
                continue;
            }
            self.jobs
                .enqueue(NewJob::tenant_sync(
                    &tenant.id,
                    JobPriority::Background,
                    SyncTrigger::Auto,
                ))
                .await?;
            enqueued += 1;
        }

        info!(enqueued, "auto sync pass done");
        Ok(enqueued)
    }
}
