//! Advisory locks and cooldown windows.
//!
//! Nothing here writes. A lock is "held" when some job with the same
//! `lock_key` is `running`; a cooldown is derived from a last-run timestamp
//! the caller already has.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::error::StoreResult;
use crate::jobs::store::JobStore;

pub const TENANT_LOCK_TTL_MINUTES: i64 = 20;
pub const DEFAULT_LOCK_TTL_MINUTES: i64 = 15;

/// Minimum spacing between two runs of the same operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownWindow {
    /// 24h between scheduled tenant syncs.
    AutoSync,
    /// 15min between user-triggered tenant syncs.
    ManualSync,
    /// 10min between refreshes of one listing.
    ListingSync,
}

impl CooldownWindow {
    pub fn duration(&self) -> Duration {
        match self {
            CooldownWindow::AutoSync => Duration::hours(24),
            CooldownWindow::ManualSync => Duration::minutes(15),
            CooldownWindow::ListingSync => Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    LockRunning,
    StaleLock,
}

impl LockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockReason::LockRunning => "lock_running",
            LockReason::StaleLock => "stale_lock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub is_locked: bool,
    pub is_stale: bool,
    pub reason: Option<LockReason>,
    /// The running job holding the lock, if any.
    pub holder: Option<Uuid>,
}

impl LockStatus {
    pub fn free() -> Self {
        Self {
            is_locked: false,
            is_stale: false,
            reason: None,
            holder: None,
        }
    }

    /// Held by a live job: the caller must not proceed.
    pub fn blocks(&self) -> bool {
        self.is_locked && !self.is_stale
    }
}

/// TTL after which a running holder is considered abandoned.
pub fn lock_ttl(lock_key: &str) -> Duration {
    if lock_key.starts_with("tenant:") {
        Duration::minutes(TENANT_LOCK_TTL_MINUTES)
    } else {
        Duration::minutes(DEFAULT_LOCK_TTL_MINUTES)
    }
}

/// Lock state for a holder that started at `started_at`.
pub fn evaluate_lock(
    lock_key: &str,
    holder: Uuid,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LockStatus {
    // A running row without started_at can't be aged; treat it as fresh.
    let is_stale = started_at
        .map(|started| now - started > lock_ttl(lock_key))
        .unwrap_or(false);

    LockStatus {
        is_locked: true,
        is_stale,
        reason: Some(if is_stale {
            LockReason::StaleLock
        } else {
            LockReason::LockRunning
        }),
        holder: Some(holder),
    }
}

#[derive(Clone)]
pub struct LockEvaluator {
    store: Arc<dyn JobStore>,
}

impl LockEvaluator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn check_lock(&self, lock_key: &str) -> StoreResult<LockStatus> {
        self.check_lock_at(lock_key, None, Utc::now()).await
    }

    /// Same as [`check_lock`](Self::check_lock) but ignores `exclude`, which is how a
    /// freshly claimed job asks "is anyone *else* running on my key?".
    pub async fn check_lock_for(&self, lock_key: &str, exclude: Uuid) -> StoreResult<LockStatus> {
        self.check_lock_at(lock_key, Some(exclude), Utc::now()).await
    }

    pub async fn check_lock_at(
        &self,
        lock_key: &str,
        exclude: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> StoreResult<LockStatus> {
        let holder = self.store.latest_running(lock_key, exclude).await?;

        Ok(match holder {
            None => LockStatus::free(),
            Some(job) => evaluate_lock(lock_key, job.id, job.started_at, now),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub in_cooldown: bool,
    pub retry_after_seconds: Option<i64>,
}

impl CooldownStatus {
    fn clear() -> Self {
        Self {
            in_cooldown: false,
            retry_after_seconds: None,
        }
    }
}

/// `last_at = None` means the operation never ran, so never in cooldown.
pub fn check_cooldown(
    window: CooldownWindow,
    last_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CooldownStatus {
    let Some(last_at) = last_at else {
        return CooldownStatus::clear();
    };

    let window = window.duration();
    let elapsed = now - last_at;
    if elapsed >= window {
        return CooldownStatus::clear();
    }

    let remaining_ms = (window - elapsed).num_milliseconds();
    // ceil(ms / 1000) for positive remaining
    let retry_after = (remaining_ms + 999).div_euclid(1000).max(1);

    CooldownStatus {
        in_cooldown: true,
        retry_after_seconds: Some(retry_after),
    }
}

pub fn check_auto_sync_cooldown(last_at: Option<DateTime<Utc>>) -> CooldownStatus {
    check_cooldown(CooldownWindow::AutoSync, last_at, Utc::now())
}

pub fn check_manual_sync_cooldown(last_at: Option<DateTime<Utc>>) -> CooldownStatus {
    check_cooldown(CooldownWindow::ManualSync, last_at, Utc::now())
}

pub fn check_listing_sync_cooldown(last_at: Option<DateTime<Utc>>) -> CooldownStatus {
    check_cooldown(CooldownWindow::ListingSync, last_at, Utc::now())
}
