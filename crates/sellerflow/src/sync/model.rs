use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

/// Persisted outcome of the latest tenant sync, surfaced to dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSyncStatus {
    Running,
    Success,
    Error,
}

impl TenantSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSyncStatus::Running => "running",
            TenantSyncStatus::Success => "success",
            TenantSyncStatus::Error => "error",
        }
    }
}

impl FromStr for TenantSyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TenantSyncStatus::Running),
            "success" => Ok(TenantSyncStatus::Success),
            "error" => Ok(TenantSyncStatus::Error),
            other => Err(format!("unknown tenant sync status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: String,
    pub last_sync_status: Option<String>,
    pub last_sync_error: Option<String>,
    pub last_sync_started_at: Option<DateTime<Utc>>,
    pub last_sync_finished_at: Option<DateTime<Utc>>,
    pub last_auto_sync_at: Option<DateTime<Utc>>,
    pub last_manual_sync_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_sync_status: None,
            last_sync_error: None,
            last_sync_started_at: None,
            last_sync_finished_at: None,
            last_auto_sync_at: None,
            last_manual_sync_at: None,
        }
    }

    pub fn sync_status(&self) -> Option<TenantSyncStatus> {
        self.last_sync_status.as_deref().and_then(|s| s.parse().ok())
    }
}

pub const LISTING_ACTIVE: &str = "active";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Listing {
    pub id: String,
    pub tenant_id: String,
    /// Marketplace-side identifier (e.g. `MLB123456`).
    pub external_id: String,
    pub status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == LISTING_ACTIVE
    }
}
