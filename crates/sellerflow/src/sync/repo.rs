// crates/sellerflow/src/sync/repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::jobs::error::StoreResult;
use crate::jobs::model::{truncate_error, SyncTrigger};
use crate::sync::model::{Listing, Tenant, TenantSyncStatus};
use crate::sync::store::TenantStore;

#[derive(Clone)]
pub struct TenantsRepo {
    pool: PgPool,
}

impl TenantsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for TenantsRepo {
    async fn get_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, last_sync_status, last_sync_error,
                   last_sync_started_at, last_sync_finished_at,
                   last_auto_sync_at, last_manual_sync_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, last_sync_status, last_sync_error,
                   last_sync_started_at, last_sync_finished_at,
                   last_auto_sync_at, last_manual_sync_at
            FROM tenants
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }

    async fn get_listing(&self, tenant_id: &str, listing_id: &str) -> StoreResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            SELECT id, tenant_id, external_id, status, last_synced_at
            FROM listings
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn mark_sync_running(&self, tenant_id: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET last_sync_status = $2,
                last_sync_error = NULL,
                last_sync_started_at = now()
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(TenantSyncStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_sync_success(&self, tenant_id: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET last_sync_status = $2,
                last_sync_error = NULL,
                last_sync_finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(TenantSyncStatus::Success.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_sync_error(&self, tenant_id: &str, message: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET last_sync_status = $2,
                last_sync_error = $3,
                last_sync_finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(TenantSyncStatus::Error.as_str())
        .bind(truncate_error(message))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn listings_for_sync(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT id, tenant_id, external_id, status, last_synced_at
            FROM listings
            WHERE tenant_id = $1
              AND status = 'active'
            ORDER BY last_synced_at ASC NULLS FIRST, id ASC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    async fn mark_listing_synced(&self, listing_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE listings SET last_synced_at = now() WHERE id = $1")
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Conditional UPDATE: of two concurrent claims on the same window, the
    /// second matches zero rows.
    async fn claim_sync_request(
        &self,
        tenant_id: &str,
        trigger: SyncTrigger,
        not_after: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let sql = match trigger {
            SyncTrigger::Manual => {
                r#"
                UPDATE tenants
                SET last_manual_sync_at = now()
                WHERE id = $1
                  AND (last_manual_sync_at IS NULL OR last_manual_sync_at <= $2)
                "#
            }
            SyncTrigger::Auto => {
                r#"
                UPDATE tenants
                SET last_auto_sync_at = now()
                WHERE id = $1
                  AND (last_auto_sync_at IS NULL OR last_auto_sync_at <= $2)
                "#
            }
        };
        let res = sqlx::query(sql)
            .bind(tenant_id)
            .bind(not_after)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() == 1)
    }
}
