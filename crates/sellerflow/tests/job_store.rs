// tests/job_store.rs
mod common;

use common::setup_db;

use chrono::{Duration, Utc};
use sellerflow::jobs::model::{SyncTrigger, MAX_ERROR_CHARS};
use sellerflow::jobs::{JobPriority, JobStatus, JobStore, JobsRepo, NewJob};
use serial_test::serial;
use std::collections::HashSet;

fn tenant_job(tenant: &str, priority: JobPriority) -> NewJob {
    NewJob::tenant_sync(tenant, priority, SyncTrigger::Auto)
}

#[tokio::test]
#[serial]
async fn two_pollers_never_claim_the_same_job() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool.clone());

    for i in 0..10 {
        repo.enqueue(tenant_job(&format!("T{i}"), JobPriority::Background))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            for _ in 0..10 {
                if let Some(job) = repo.dequeue(&[JobPriority::Background]).await.unwrap() {
                    claimed.push(job.id);
                }
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for h in handles {
        for id in h.await.unwrap() {
            assert!(seen.insert(id), "job {id} claimed twice");
        }
    }

    let counts = repo.count_by_status().await.unwrap();
    assert_eq!(counts[&JobStatus::Running] as usize, seen.len());
    assert_eq!(
        counts[&JobStatus::Queued] + counts[&JobStatus::Running],
        10
    );
}

#[tokio::test]
#[serial]
async fn dequeue_orders_by_priority_then_run_after() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool);
    let now = Utc::now();

    let mut old_bg = tenant_job("T1", JobPriority::Background);
    old_bg.run_after = Some(now - Duration::minutes(30));
    let old_bg = repo.enqueue(old_bg).await.unwrap();

    let mut late_fg = tenant_job("T2", JobPriority::Interactive);
    late_fg.run_after = Some(now - Duration::seconds(5));
    let late_fg = repo.enqueue(late_fg).await.unwrap();

    let mut early_fg = tenant_job("T3", JobPriority::Interactive);
    early_fg.run_after = Some(now - Duration::minutes(1));
    let early_fg = repo.enqueue(early_fg).await.unwrap();

    let mut future = tenant_job("T4", JobPriority::Interactive);
    future.run_after = Some(now + Duration::hours(1));
    repo.enqueue(future).await.unwrap();

    let order = [JobPriority::Interactive, JobPriority::Background];
    let claimed = vec![
        repo.dequeue(&order).await.unwrap().unwrap().id,
        repo.dequeue(&order).await.unwrap().unwrap().id,
        repo.dequeue(&order).await.unwrap().unwrap().id,
    ];
    assert_eq!(claimed, vec![early_fg, late_fg, old_bg]);
    assert!(repo.dequeue(&order).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn claimed_job_is_running_with_attempt() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool);

    let id = repo
        .enqueue(NewJob::listing_sync("T1", "l1", "MLB1", JobPriority::Interactive))
        .await
        .unwrap();

    let job = repo
        .dequeue(&[JobPriority::Interactive])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.attempts, 1);
    assert!(job.started_at.is_some());
    assert_eq!(job.lock_key, "listing:l1:LISTING_SYNC");
    assert!(job.decode_payload().is_ok());
}

#[tokio::test]
#[serial]
async fn terminal_transitions_persist() {
    let Some(pool) = setup_db().await else { return };
    let repo = JobsRepo::new(pool);

    let failed = repo
        .enqueue(tenant_job("T1", JobPriority::Background))
        .await
        .unwrap();
    repo.mark_running(failed).await.unwrap();
    repo.mark_error(failed, &"é".repeat(MAX_ERROR_CHARS + 50))
        .await
        .unwrap();

    let job = repo.get_job(failed).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.unwrap().chars().count(), MAX_ERROR_CHARS);
    assert!(job.finished_at.is_some());

    let skipped = repo
        .enqueue(tenant_job("T2", JobPriority::Background))
        .await
        .unwrap();
    repo.mark_skipped(skipped, "lock_running").await.unwrap();
    let job = repo.get_job(skipped).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Skipped);
    assert_eq!(job.error.as_deref(), Some("lock_running"));

    repo.mark_success(skipped).await.unwrap();
    let job = repo.get_job(skipped).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.error, None);
}
