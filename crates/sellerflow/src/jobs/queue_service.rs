//! Managed queue-service backend. Placeholder until the broker integration lands:
//! every call fails so a misconfigured deployment is loud, never silent.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::jobs::error::{StoreError, StoreResult};
use crate::jobs::model::{Job, JobPriority, JobStatus, NewJob};
use crate::jobs::store::JobStore;

#[derive(Debug, Clone, Default)]
pub struct QueueServiceJobStore;

impl QueueServiceJobStore {
    pub fn new() -> Self {
        Self
    }

    fn unsupported<T>(&self) -> StoreResult<T> {
        Err(StoreError::NotImplemented { driver: "sqs" })
    }
}

#[async_trait]
impl JobStore for QueueServiceJobStore {
    async fn enqueue(&self, _job: NewJob) -> StoreResult<Uuid> {
        self.unsupported()
    }

    async fn dequeue(&self, _priorities: &[JobPriority]) -> StoreResult<Option<Job>> {
        self.unsupported()
    }

    async fn mark_running(&self, _job_id: Uuid) -> StoreResult<()> {
        self.unsupported()
    }

    async fn mark_success(&self, _job_id: Uuid) -> StoreResult<()> {
        self.unsupported()
    }

    async fn mark_error(&self, _job_id: Uuid, _message: &str) -> StoreResult<()> {
        self.unsupported()
    }

    async fn mark_skipped(&self, _job_id: Uuid, _reason: &str) -> StoreResult<()> {
        self.unsupported()
    }

    async fn get_job(&self, _job_id: Uuid) -> StoreResult<Option<Job>> {
        self.unsupported()
    }

    async fn latest_running(
        &self,
        _lock_key: &str,
        _exclude: Option<Uuid>,
    ) -> StoreResult<Option<Job>> {
        self.unsupported()
    }

    async fn count_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>> {
        self.unsupported()
    }
}
