// crates/sellerflow/src/jobs/repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::jobs::error::StoreResult;
use crate::jobs::model::{truncate_error, Job, JobPriority, JobRecord, JobStatus, NewJob};
use crate::jobs::store::JobStore;

/// Postgres-backed job store.
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for JobsRepo {
    // ----------------------------
    // Enqueue
    // ----------------------------

    async fn enqueue(&self, job: NewJob) -> StoreResult<Uuid> {
        let payload = job.payload.to_value()?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO jobs (id, tenant_id, type, status, priority, payload, lock_key, run_after)
            VALUES ($1, $2, $3, 'queued', $4, $5, $6, COALESCE($7, now()))
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&job.tenant_id)
        .bind(job.job_type().as_str())
        .bind(job.priority.as_str())
        .bind(payload)
        .bind(&job.lock_key)
        .bind(job.run_after)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    // ----------------------------
    // Claim
    // ----------------------------

    /// Two steps on purpose: pick a candidate, then compare-and-swap its status.
    /// No row lock is held between them; a concurrent poller that flips the row
    /// first makes our UPDATE match zero rows and we report "no job".
    async fn dequeue(&self, priorities: &[JobPriority]) -> StoreResult<Option<Job>> {
        if priorities.is_empty() {
            return Ok(None);
        }
        let ranked: Vec<String> = priorities.iter().map(|p| p.as_str().to_string()).collect();

        let candidate = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM jobs
            WHERE status = 'queued'
              AND priority = ANY($1::text[])
              AND run_after <= now()
            ORDER BY array_position($1::text[], priority), run_after ASC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(&ranked)
        .fetch_optional(&self.pool)
        .await?;

        let Some(job_id) = candidate else {
            return Ok(None);
        };

        let claimed = sqlx::query_as::<_, JobRecord>(
            r#"
            UPDATE jobs
            SET status = 'running',
                started_at = now(),
                attempts = attempts + 1
            WHERE id = $1
              AND status = 'queued'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        claimed.map(Job::try_from).transpose()
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    async fn mark_running(&self, job_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running',
                started_at = now(),
                attempts = attempts + 1
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_success(&self, job_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'success',
                finished_at = now(),
                error = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_error(&self, job_id: Uuid, message: &str) -> StoreResult<()> {
        self.finish_with(job_id, JobStatus::Error, message).await
    }

    async fn mark_skipped(&self, job_id: Uuid, reason: &str) -> StoreResult<()> {
        self.finish_with(job_id, JobStatus::Skipped, reason).await
    }

    // ----------------------------
    // Reads
    // ----------------------------

    async fn get_job(&self, job_id: Uuid) -> StoreResult<Option<Job>> {
        let rec = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        rec.map(Job::try_from).transpose()
    }

    async fn latest_running(
        &self,
        lock_key: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<Job>> {
        let rec = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT *
            FROM jobs
            WHERE lock_key = $1
              AND status = 'running'
              AND ($2::uuid IS NULL OR id <> $2::uuid)
            ORDER BY started_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(lock_key)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        rec.map(Job::try_from).transpose()
    }

    async fn count_by_status(&self) -> StoreResult<HashMap<JobStatus, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<JobStatus, i64> =
            JobStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (status, n) in rows {
            if let Ok(status) = status.parse::<JobStatus>() {
                counts.insert(status, n);
            }
        }
        Ok(counts)
    }
}

impl JobsRepo {
    async fn finish_with(&self, job_id: Uuid, status: JobStatus, message: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                finished_at = now(),
                error = $3
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(truncate_error(message))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
