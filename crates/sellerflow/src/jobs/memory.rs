//! In-memory job store: same claim and ordering rules as Postgres, state in a map.
//! Used by unit tests and single-process tooling.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::jobs::error::StoreResult;
use crate::jobs::model::{truncate_error, Job, JobPriority, JobStatus, NewJob};
use crate::jobs::store::JobStore;

#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a fully formed job in place, e.g. a `running` row with a back-dated `started_at`.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        jobs
    }

    async fn update<F>(&self, job_id: Uuid, f: F)
    where
        F: FnOnce(&mut Job),
    {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            f(job);
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NewJob) -> StoreResult<Uuid> {
        let now = Utc::now();
        let payload = job.payload.to_value()?;
        let record = Job {
            id: Uuid::new_v4(),
            tenant_id: job.tenant_id.clone(),
            job_type: job.job_type().as_str().to_string(),
            status: JobStatus::Queued,
            priority: job.priority,
            payload,
            lock_key: job.lock_key,
            run_after: job.run_after.unwrap_or(now),
            attempts: 0,
            started_at: None,
            finished_at: None,
            error: None,
            created_at: now,
        };
        let id = record.id;
        self.jobs.write().await.insert(id, record);
        Ok(id)
    }

    async fn dequeue(&self, priorities: &[JobPriority]) -> StoreResult<Option<Job>> {
        let now = Utc::now();
        let mut guard = self.jobs.write().await;

        let candidate = guard
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.run_after <= now)
            .filter_map(|j| {
                priorities
                    .iter()
                    .position(|p| *p == j.priority)
                    .map(|rank| (rank, j.run_after, j.created_at, j.id))
            })
            .min()
            .map(|(_, _, _, id)| id);

        let Some(id) = candidate else {
            return Ok(None);
        };

        match guard.get_mut(&id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Running;
                job.started_at = Some(now);
                job.attempts = job.attempts.saturating_add(1);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_running(&self, job_id: Uuid) -> StoreResult<()> {
        self.update(job_id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            job.attempts = job.attempts.saturating_add(1);
        })
        .await;
        Ok(())
    }

    async fn mark_success(&self, job_id: Uuid) -> StoreResult<()> {
        self.update(job_id, |job| {
            job.status = JobStatus::Success;
            job.finished_at = Some(Utc::now());
            job.error = None;
        })
        .await;
        Ok(())
    }

    async fn mark_error(&self, job_id: Uuid, message: &str) -> StoreResult<()> {
        let message = truncate_error(message);
        self.update(job_id, |job| {
            job.status = JobStatus::Error;
            job.finished_at = Some(Utc::now());
            job.error = Some(message);
        })
        .await;
        Ok(())
    }

    async fn mark_skipped(&self, job_id: Uuid, reason: &str) -> StoreResult<()> {
        let reason = truncate_error(reason);
        self.update(job_id, |job| {
            job.status = JobStatus::Skipped;
            job.finished_at = Some(Utc::now());
            job.error = Some(reason);
        })
        .await;
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn latest_running(
        &self,
        lock_key: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<Job>> {
        let guard = self.jobs.read().await;
        let job = guard
            .values()
            .filter(|j| j.status == JobStatus::Running && j.lock_key == lock_key)
            .filter(|j| Some(j.id) != exclude)
            .max_by_key(|j| j.started_at)
            .cloned();
        Ok(job)
    }

    async fn count_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>> {
        let mut counts: HashMap<JobStatus, i64> =
            JobStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for job in self.jobs.read().await.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::{SyncTrigger, MAX_ERROR_CHARS};
    use chrono::Duration;

    fn tenant_job(tenant: &str, priority: JobPriority) -> NewJob {
        NewJob::tenant_sync(tenant, priority, SyncTrigger::Manual)
    }

    #[tokio::test]
    async fn concurrent_dequeues_claim_a_job_once() {
        let store = InMemoryJobStore::new();
        let id = store
            .enqueue(tenant_job("T1", JobPriority::Background))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.dequeue(&[JobPriority::Background]).await.unwrap()
            }));
        }

        let mut winners = Vec::new();
        for h in handles {
            if let Some(job) = h.await.unwrap() {
                winners.push(job.id);
            }
        }
        assert_eq!(winners, vec![id]);

        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);
        assert!(job.started_at.is_some());
    }

    #[tokio::test]
    async fn interactive_is_dequeued_before_background() {
        let store = InMemoryJobStore::new();
        let bg = store
            .enqueue(tenant_job("T1", JobPriority::Background))
            .await
            .unwrap();
        let fg = store
            .enqueue(tenant_job("T2", JobPriority::Interactive))
            .await
            .unwrap();

        let order = [JobPriority::Interactive, JobPriority::Background];
        assert_eq!(store.dequeue(&order).await.unwrap().unwrap().id, fg);
        assert_eq!(store.dequeue(&order).await.unwrap().unwrap().id, bg);
        assert!(store.dequeue(&order).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn older_run_after_wins_within_a_priority() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut later = tenant_job("T1", JobPriority::Background);
        later.run_after = Some(now - Duration::seconds(10));
        let later = store.enqueue(later).await.unwrap();

        let mut earlier = tenant_job("T2", JobPriority::Background);
        earlier.run_after = Some(now - Duration::seconds(60));
        let earlier = store.enqueue(earlier).await.unwrap();

        let order = [JobPriority::Background];
        assert_eq!(store.dequeue(&order).await.unwrap().unwrap().id, earlier);
        assert_eq!(store.dequeue(&order).await.unwrap().unwrap().id, later);
    }

    #[tokio::test]
    async fn future_and_unrequested_jobs_are_not_dequeued() {
        let store = InMemoryJobStore::new();

        let mut future = tenant_job("T1", JobPriority::Interactive);
        future.run_after = Some(Utc::now() + Duration::minutes(5));
        store.enqueue(future).await.unwrap();
        store
            .enqueue(tenant_job("T2", JobPriority::Background))
            .await
            .unwrap();

        assert!(store
            .dequeue(&[JobPriority::Interactive])
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mark_error_truncates_message() {
        let store = InMemoryJobStore::new();
        let id = store
            .enqueue(tenant_job("T1", JobPriority::Background))
            .await
            .unwrap();

        store.mark_error(id, &"x".repeat(20_000)).await.unwrap();

        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.unwrap().len(), MAX_ERROR_CHARS);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn mark_success_clears_error() {
        let store = InMemoryJobStore::new();
        let id = store
            .enqueue(tenant_job("T1", JobPriority::Background))
            .await
            .unwrap();

        store.mark_running(id).await.unwrap();
        store.mark_skipped(id, "lock_running").await.unwrap();
        store.mark_success(id).await.unwrap();

        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.error, None);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn latest_running_ignores_excluded_job() {
        let store = InMemoryJobStore::new();
        let id = store
            .enqueue(tenant_job("T1", JobPriority::Background))
            .await
            .unwrap();
        store.mark_running(id).await.unwrap();

        assert!(store.latest_running("tenant:T1", None).await.unwrap().is_some());
        assert!(store
            .latest_running("tenant:T1", Some(id))
            .await
            .unwrap()
            .is_none());
        assert!(store.latest_running("tenant:T2", None).await.unwrap().is_none());
    }
}
