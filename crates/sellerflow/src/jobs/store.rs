//! Job store contract shared by every backend.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::jobs::error::StoreResult;
use crate::jobs::model::{Job, JobPriority, JobStatus, NewJob};

/// Dequeue order used by the runner: interactive work first.
pub const DEFAULT_PRIORITY_ORDER: [JobPriority; 2] =
    [JobPriority::Interactive, JobPriority::Background];

/// Persistent job queue.
///
/// Claiming is optimistic: `dequeue` selects a candidate, then flips it to
/// `running` only if it is still `queued`. A worker that loses that race gets
/// `Ok(None)`, never the stale row.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `queued` job and return its id.
    async fn enqueue(&self, job: NewJob) -> StoreResult<Uuid>;

    /// Claim the best eligible queued job whose priority is in `priorities`.
    /// Ranking follows the order of `priorities`, then `run_after` ascending.
    async fn dequeue(&self, priorities: &[JobPriority]) -> StoreResult<Option<Job>>;

    async fn mark_running(&self, job_id: Uuid) -> StoreResult<()>;

    async fn mark_success(&self, job_id: Uuid) -> StoreResult<()>;

    /// `message` is truncated to `MAX_ERROR_CHARS` before it is stored.
    async fn mark_error(&self, job_id: Uuid, message: &str) -> StoreResult<()>;

    /// Terminal state for lock contention; `reason` lands in the `error` column.
    async fn mark_skipped(&self, job_id: Uuid, reason: &str) -> StoreResult<()>;

    async fn get_job(&self, job_id: Uuid) -> StoreResult<Option<Job>>;

    /// Most recently started `running` job holding `lock_key`, ignoring `exclude`.
    async fn latest_running(&self, lock_key: &str, exclude: Option<Uuid>)
        -> StoreResult<Option<Job>>;

    async fn count_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>>;
}
