use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::timeout;

use crate::jobs::error::JobError;
use crate::jobs::model::{Job, JobPayload, JobType};

/// Executes one kind of job. `payload` is already decoded from the row.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job, payload: JobPayload) -> Result<(), JobError>;
}

#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Arc<dyn JobHandler>,
    pub timeout: Option<Duration>,
}

impl HandlerEntry {
    /// Runs the handler, bounded by `timeout` when one is configured.
    /// The timed-out future is dropped and runs no cleanup. Handlers that
    /// record their own failure state should bound themselves instead.
    pub async fn run(&self, job: &Job, payload: JobPayload) -> Result<(), JobError> {
        let fut = self.handler.run(job, payload);
        match self.timeout {
            Some(dur) => match timeout(dur, fut).await {
                Ok(inner) => inner,
                Err(_) => Err(JobError::new(
                    "TIMEOUT",
                    format!("handler timeout after {}ms", dur.as_millis()),
                )),
            },
            None => fut.await,
        }
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: JobType, handler: Arc<dyn JobHandler>) {
        self.register_with_timeout(job_type, handler, None);
    }

    pub fn register_with_timeout(
        &mut self,
        job_type: JobType,
        handler: Arc<dyn JobHandler>,
        timeout: Option<Duration>,
    ) {
        self.handlers
            .insert(job_type, HandlerEntry { handler, timeout });
    }

    pub fn handler_for(&self, job_type: JobType) -> Option<&HandlerEntry> {
        self.handlers.get(&job_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::{JobPriority, JobStatus, SyncTrigger, TenantSyncPayload};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    struct Sleepy(Duration);

    #[async_trait]
    impl JobHandler for Sleepy {
        async fn run(&self, _job: &Job, _payload: JobPayload) -> Result<(), JobError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn job() -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            tenant_id: "T1".into(),
            job_type: "TENANT_SYNC".into(),
            status: JobStatus::Running,
            priority: JobPriority::Interactive,
            payload: json!({ "trigger": "manual" }),
            lock_key: "tenant:T1".into(),
            run_after: now,
            attempts: 1,
            started_at: Some(now),
            finished_at: None,
            error: None,
            created_at: now,
        }
    }

    fn payload() -> JobPayload {
        JobPayload::TenantSync(TenantSyncPayload {
            trigger: SyncTrigger::Manual,
        })
    }

    #[tokio::test]
    async fn timeout_turns_into_job_error() {
        let mut registry = HandlerRegistry::new();
        registry.register_with_timeout(
            JobType::TenantSync,
            Arc::new(Sleepy(Duration::from_millis(200))),
            Some(Duration::from_millis(20)),
        );

        let entry = registry.handler_for(JobType::TenantSync).unwrap();
        let err = entry.run(&job(), payload()).await.unwrap_err();
        assert_eq!(err.code, "TIMEOUT");
    }

    #[tokio::test]
    async fn no_timeout_by_default() {
        let mut registry = HandlerRegistry::new();
        registry.register(JobType::TenantSync, Arc::new(Sleepy(Duration::from_millis(10))));

        let entry = registry.handler_for(JobType::TenantSync).unwrap();
        assert!(entry.run(&job(), payload()).await.is_ok());
        assert!(registry.handler_for(JobType::ListingSync).is_none());
    }
}
