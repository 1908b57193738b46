use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::jobs::error::StoreError;

/// Upper bound on the stored `error` column.
pub const MAX_ERROR_CHARS: usize = 10_000;

/// Job row as it sits in the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub tenant_id: String,
    #[sqlx(rename = "type")]
    pub job_type: String,
    pub status: String,
    pub priority: String,
    pub payload: Value,
    pub lock_key: String,
    pub run_after: DateTime<Utc>,
    pub attempts: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A unit of deferred work.
///
/// `job_type` and `payload` stay in their stored form so a row written by a newer
/// deployment (unknown type) can still be claimed and failed individually.
/// Use [`Job::decode_payload`] to get the typed view.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub payload: Value,
    pub lock_key: String,
    pub run_after: DateTime<Utc>,
    pub attempts: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn kind(&self) -> Option<JobType> {
        self.job_type.parse().ok()
    }

    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        JobPayload::decode(&self.job_type, self.payload.clone())
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = StoreError;

    fn try_from(rec: JobRecord) -> Result<Self, Self::Error> {
        let status = rec
            .status
            .parse()
            .map_err(|reason| StoreError::InvalidRecord { id: rec.id, reason })?;
        let priority = rec
            .priority
            .parse()
            .map_err(|reason| StoreError::InvalidRecord { id: rec.id, reason })?;

        Ok(Self {
            id: rec.id,
            tenant_id: rec.tenant_id,
            job_type: rec.job_type,
            status,
            priority,
            payload: rec.payload,
            lock_key: rec.lock_key,
            run_after: rec.run_after,
            attempts: rec.attempts,
            started_at: rec.started_at,
            finished_at: rec.finished_at,
            error: rec.error,
            created_at: rec.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub tenant_id: String,
    pub priority: JobPriority,
    pub lock_key: String,
    /// `None` means "eligible immediately".
    pub run_after: Option<DateTime<Utc>>,
    pub payload: JobPayload,
}

impl NewJob {
    /// Tenant-wide sync, serialized on `tenant:<id>`.
    pub fn tenant_sync(tenant_id: &str, priority: JobPriority, trigger: SyncTrigger) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            priority,
            lock_key: tenant_lock_key(tenant_id),
            run_after: None,
            payload: JobPayload::TenantSync(TenantSyncPayload { trigger }),
        }
    }

    /// Single-listing refresh, serialized on `listing:<id>:LISTING_SYNC`.
    pub fn listing_sync(
        tenant_id: &str,
        listing_id: &str,
        external_id: &str,
        priority: JobPriority,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            priority,
            lock_key: listing_lock_key(listing_id, JobType::ListingSync),
            run_after: None,
            payload: JobPayload::ListingSync(ListingSyncPayload {
                listing_id: listing_id.to_string(),
                external_id: external_id.to_string(),
                period_days: LISTING_SYNC_PERIOD_DAYS,
            }),
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }
}

pub fn tenant_lock_key(tenant_id: &str) -> String {
    format!("tenant:{tenant_id}")
}

pub fn listing_lock_key(listing_id: &str, job_type: JobType) -> String {
    format!("listing:{listing_id}:{job_type}")
}

/// Analysis window requested from the marketplace on every listing refresh.
pub const LISTING_SYNC_PERIOD_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    TenantSync,
    ListingSync,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::TenantSync => "TENANT_SYNC",
            JobType::ListingSync => "LISTING_SYNC",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TENANT_SYNC" => Ok(JobType::TenantSync),
            "LISTING_SYNC" => Ok(JobType::ListingSync),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Error,
    Skipped,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Error,
        JobStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
            JobStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error | JobStatus::Skipped)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            "skipped" => Ok(JobStatus::Skipped),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Interactive work is user-triggered and always dequeued before background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Interactive,
    Background,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Interactive => "interactive",
            JobPriority::Background => "background",
        }
    }
}

impl FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(JobPriority::Interactive),
            "background" => Ok(JobPriority::Background),
            other => Err(format!("unknown job priority: {other}")),
        }
    }
}

/// What caused a tenant sync to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSyncPayload {
    pub trigger: SyncTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSyncPayload {
    pub listing_id: String,
    pub external_id: String,
    pub period_days: u32,
}

/// Typed payload, one variant per job type.
///
/// Stored split in two columns: the tag goes to `type`, the content to `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum JobPayload {
    #[serde(rename = "TENANT_SYNC")]
    TenantSync(TenantSyncPayload),
    #[serde(rename = "LISTING_SYNC")]
    ListingSync(ListingSyncPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::TenantSync(_) => JobType::TenantSync,
            JobPayload::ListingSync(_) => JobType::ListingSync,
        }
    }

    /// Content half of the payload, i.e. what goes in the `payload` column.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            JobPayload::TenantSync(p) => serde_json::to_value(p),
            JobPayload::ListingSync(p) => serde_json::to_value(p),
        }
    }

    pub fn decode(job_type: &str, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "type": job_type, "payload": payload }))
    }
}

/// Cuts `message` down to [`MAX_ERROR_CHARS`] characters (not bytes).
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
