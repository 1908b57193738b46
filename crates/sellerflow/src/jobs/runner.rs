use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::jobs::handlers::HandlerRegistry;
use crate::jobs::locks::LockEvaluator;
use crate::jobs::model::{Job, JobType};
use crate::jobs::store::{JobStore, DEFAULT_PRIORITY_ORDER};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Skipped { job_id: Uuid, reason: String },
    Succeeded { job_id: Uuid },
    Failed { job_id: Uuid, code: &'static str },
}

/// Polling dispatcher.
///
/// Each tick claims at most one job, checks the job's lock key, runs the
/// handler for its type and records the outcome. Jobs are processed one at a
/// time; parallelism comes from running more processes. No retries here: a
/// failed job stays `error` until someone enqueues it again.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    locks: LockEvaluator,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    // Some(token) from start() until the loop task exits.
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            locks: LockEvaluator::new(Arc::clone(&store)),
            store,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// True from `start` until the loop task has actually exited, including
    /// while a stopped loop is still finishing its current job.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Spawns the poll loop. Returns `None` if a loop is already active, or a
    /// stopped one has not finished its current tick yet.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let token = {
            let mut guard = self.active.lock().ok()?;
            if guard.is_some() {
                warn!("job runner already started");
                return None;
            }
            let token = CancellationToken::new();
            *guard = Some(token.clone());
            token
        };

        // Frees the slot when the task ends, however it ends.
        let slot = ActiveSlot(Arc::clone(&self.active));
        let runner = self.clone();
        Some(tokio::spawn(async move {
            let _slot = slot;
            runner.run_loop(token).await
        }))
    }

    /// Signals the loop to exit after the current tick. Returns `false` if it
    /// was not running or is already stopping.
    pub fn stop(&self) -> bool {
        let Ok(guard) = self.active.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    async fn run_loop(self, token: CancellationToken) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "job runner started"
        );

        // The full interval elapses between the end of one tick and the next,
        // however long the job took.
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            // A failed tick (store unreachable, ...) never ends the loop.
            if let Err(err) = self.tick().await {
                error!(error = %err, "job runner tick failed");
            }
        }

        info!("job runner stopped");
    }

    /// One poll: dequeue, lock check, dispatch, record.
    pub async fn tick(&self) -> anyhow::Result<TickOutcome> {
        let Some(job) = self.store.dequeue(&DEFAULT_PRIORITY_ORDER).await? else {
            return Ok(TickOutcome::Idle);
        };

        // Second line of defense: the row is ours, but is the tenant/listing free?
        let lock = match self.locks.check_lock_for(&job.lock_key, job.id).await {
            Ok(lock) => lock,
            Err(err) => {
                // Don't leave the claimed row squatting on its own lock key.
                if let Err(mark_err) = self
                    .store
                    .mark_error(job.id, &format!("lock check failed: {err}"))
                    .await
                {
                    warn!(job_id = %job.id, error = %mark_err, "could not record lock check failure");
                }
                return Err(err.into());
            }
        };

        if lock.blocks() {
            let reason = lock.reason.map(|r| r.as_str()).unwrap_or("lock_running");
            info!(
                job_id = %job.id,
                lock_key = %job.lock_key,
                holder = ?lock.holder,
                reason,
                "lock held, skipping job"
            );
            self.store.mark_skipped(job.id, reason).await?;
            return Ok(TickOutcome::Skipped {
                job_id: job.id,
                reason: reason.to_string(),
            });
        }

        if lock.is_stale {
            warn!(
                job_id = %job.id,
                lock_key = %job.lock_key,
                holder = ?lock.holder,
                "stale lock ignored"
            );
        }

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            tenant_id = %job.tenant_id,
            attempt = job.attempts,
            "running job"
        );

        match self.execute(&job).await {
            Ok(()) => {
                self.store.mark_success(job.id).await?;
                info!(job_id = %job.id, "job succeeded");
                Ok(TickOutcome::Succeeded { job_id: job.id })
            }
            Err(err) => {
                warn!(job_id = %job.id, code = err.code, error = %err.message, "job failed");
                self.store.mark_error(job.id, &err.message).await?;
                Ok(TickOutcome::Failed {
                    job_id: job.id,
                    code: err.code,
                })
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<(), JobError> {
        let job_type: JobType = job
            .job_type
            .parse()
            .map_err(|e: String| JobError::new("UNKNOWN_JOB_TYPE", e))?;

        let payload = job
            .decode_payload()
            .map_err(|e| JobError::bad_payload(e.to_string()))?;

        let entry = self.registry.handler_for(job_type).ok_or_else(|| {
            JobError::new("NO_HANDLER", format!("no handler for job_type={job_type}"))
        })?;

        entry.run(job, payload).await
    }
}

struct ActiveSlot(Arc<Mutex<Option<CancellationToken>>>);

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.0.lock() {
            guard.take();
        }
    }
}
