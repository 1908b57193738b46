//! `LISTING_SYNC`: refresh one listing from its marketplace.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::jobs::error::JobError;
use crate::jobs::handlers::JobHandler;
use crate::jobs::model::{Job, JobPayload, ListingSyncPayload};
use crate::sync::store::TenantStore;

/// Marketplace side of a listing refresh (Mercado Livre, Shopee, ...).
#[async_trait]
pub trait ListingRefresher: Send + Sync {
    async fn refresh(&self, tenant_id: &str, listing: &ListingSyncPayload) -> Result<(), JobError>;
}

/// Refresher used until a marketplace client is wired in: logs and succeeds.
#[derive(Debug, Clone, Default)]
pub struct NoopRefresher;

#[async_trait]
impl ListingRefresher for NoopRefresher {
    async fn refresh(&self, tenant_id: &str, listing: &ListingSyncPayload) -> Result<(), JobError> {
        info!(
            tenant_id,
            listing_id = %listing.listing_id,
            external_id = %listing.external_id,
            period_days = listing.period_days,
            "listing refresh (noop)"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct ListingSyncHandler {
    tenants: Arc<dyn TenantStore>,
    refresher: Arc<dyn ListingRefresher>,
}

impl ListingSyncHandler {
    pub fn new(tenants: Arc<dyn TenantStore>, refresher: Arc<dyn ListingRefresher>) -> Self {
        Self { tenants, refresher }
    }
}

#[async_trait]
impl JobHandler for ListingSyncHandler {
    async fn run(&self, job: &Job, payload: JobPayload) -> Result<(), JobError> {
        let listing = match payload {
            JobPayload::ListingSync(p) => p,
            other => {
                return Err(JobError::bad_payload(format!(
                    "expected LISTING_SYNC payload, got {}",
                    other.job_type()
                )))
            }
        };

        self.refresher.refresh(&job.tenant_id, &listing).await?;
        // A failed refresh leaves last_synced_at untouched.
        self.tenants.mark_listing_synced(&listing.listing_id).await?;
        Ok(())
    }
}
