use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::jobs::error::StoreResult;
use crate::jobs::model::SyncTrigger;
use crate::sync::model::{Listing, Tenant};

/// Tenant and listing state the sync pipeline reads and stamps.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>>;

    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>>;

    async fn get_listing(&self, tenant_id: &str, listing_id: &str) -> StoreResult<Option<Listing>>;

    /// Sync status -> `running`, error cleared, start time recorded.
    async fn mark_sync_running(&self, tenant_id: &str) -> StoreResult<()>;

    async fn mark_sync_success(&self, tenant_id: &str) -> StoreResult<()>;

    async fn mark_sync_error(&self, tenant_id: &str, message: &str) -> StoreResult<()>;

    /// Up to `limit` active listings, least recently synced first (never synced leads).
    async fn listings_for_sync(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<Listing>>;

    async fn mark_listing_synced(&self, listing_id: &str) -> StoreResult<()>;

    /// Stamps `last_manual_sync_at` or `last_auto_sync_at` with now, but only if it is
    /// unset or at or before `not_after`. Check and stamp are one atomic step; returns
    /// `false` when another request already holds the window (or the tenant is gone).
    async fn claim_sync_request(
        &self,
        tenant_id: &str,
        trigger: SyncTrigger,
        not_after: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
