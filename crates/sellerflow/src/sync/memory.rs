//! In-memory tenant/listing state for tests and local tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::jobs::error::StoreResult;
use crate::jobs::model::{truncate_error, SyncTrigger};
use crate::sync::model::{Listing, Tenant, TenantSyncStatus, LISTING_ACTIVE};
use crate::sync::store::TenantStore;

#[derive(Default)]
struct State {
    tenants: HashMap<String, Tenant>,
    listings: HashMap<String, Listing>,
}

#[derive(Clone, Default)]
pub struct InMemoryTenantStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_tenant(&self, tenant: Tenant) {
        self.state
            .write()
            .await
            .tenants
            .insert(tenant.id.clone(), tenant);
    }

    pub async fn put_listing(
        &self,
        tenant_id: &str,
        listing_id: &str,
        external_id: &str,
        last_synced_at: Option<DateTime<Utc>>,
    ) {
        let listing = Listing {
            id: listing_id.to_string(),
            tenant_id: tenant_id.to_string(),
            external_id: external_id.to_string(),
            status: LISTING_ACTIVE.to_string(),
            last_synced_at,
        };
        self.put_listing_record(listing).await;
    }

    pub async fn put_listing_record(&self, listing: Listing) {
        self.state
            .write()
            .await
            .listings
            .insert(listing.id.clone(), listing);
    }

    async fn with_tenant<F>(&self, tenant_id: &str, f: F)
    where
        F: FnOnce(&mut Tenant),
    {
        if let Some(t) = self.state.write().await.tenants.get_mut(tenant_id) {
            f(t);
        }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>> {
        Ok(self.state.read().await.tenants.get(tenant_id).cloned())
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.state.read().await.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tenants)
    }

    async fn get_listing(&self, tenant_id: &str, listing_id: &str) -> StoreResult<Option<Listing>> {
        Ok(self
            .state
            .read()
            .await
            .listings
            .get(listing_id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned())
    }

    async fn mark_sync_running(&self, tenant_id: &str) -> StoreResult<()> {
        self.with_tenant(tenant_id, |t| {
            t.last_sync_status = Some(TenantSyncStatus::Running.as_str().to_string());
            t.last_sync_error = None;
            t.last_sync_started_at = Some(Utc::now());
        })
        .await;
        Ok(())
    }

    async fn mark_sync_success(&self, tenant_id: &str) -> StoreResult<()> {
        self.with_tenant(tenant_id, |t| {
            t.last_sync_status = Some(TenantSyncStatus::Success.as_str().to_string());
            t.last_sync_error = None;
            t.last_sync_finished_at = Some(Utc::now());
        })
        .await;
        Ok(())
    }

    async fn mark_sync_error(&self, tenant_id: &str, message: &str) -> StoreResult<()> {
        let message = truncate_error(message);
        self.with_tenant(tenant_id, |t| {
            t.last_sync_status = Some(TenantSyncStatus::Error.as_str().to_string());
            t.last_sync_error = Some(message);
            t.last_sync_finished_at = Some(Utc::now());
        })
        .await;
        Ok(())
    }

    async fn listings_for_sync(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<Listing>> {
        let mut listings: Vec<Listing> = self
            .state
            .read()
            .await
            .listings
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.is_active())
            .cloned()
            .collect();
        // None sorts before Some, which puts never-synced listings first.
        listings.sort_by(|a, b| (a.last_synced_at, &a.id).cmp(&(b.last_synced_at, &b.id)));
        listings.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(listings)
    }

    async fn mark_listing_synced(&self, listing_id: &str) -> StoreResult<()> {
        if let Some(l) = self.state.write().await.listings.get_mut(listing_id) {
            l.last_synced_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn claim_sync_request(
        &self,
        tenant_id: &str,
        trigger: SyncTrigger,
        not_after: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(tenant) = state.tenants.get_mut(tenant_id) else {
            return Ok(false);
        };

        let slot = match trigger {
            SyncTrigger::Manual => &mut tenant.last_manual_sync_at,
            SyncTrigger::Auto => &mut tenant.last_auto_sync_at,
        };
        if matches!(*slot, Some(last) if last > not_after) {
            return Ok(false);
        }
        *slot = Some(Utc::now());
        Ok(true)
    }
}
