use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

/// Connects to `TEST_DATABASE_URL`, migrates and truncates.
/// Returns `None` when the variable is not set so the suite can run without Postgres.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE jobs, listings, tenants CASCADE")
        .execute(&pool)
        .await
        .expect("truncate failed");

    Some(pool)
}

#[allow(dead_code)]
pub async fn insert_tenant(pool: &PgPool, id: &str) {
    sqlx::query("INSERT INTO tenants (id) VALUES ($1)")
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to insert tenant");
}

#[allow(dead_code)]
pub async fn insert_listing(
    pool: &PgPool,
    tenant_id: &str,
    id: &str,
    status: &str,
    last_synced_at: Option<DateTime<Utc>>,
) {
    sqlx::query(
        r#"
        INSERT INTO listings (id, tenant_id, external_id, status, last_synced_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(format!("MLB-{id}"))
    .bind(status)
    .bind(last_synced_at)
    .execute(pool)
    .await
    .expect("failed to insert listing");
}

/// Moves a job's `started_at` back in time to simulate a long-running holder.
#[allow(dead_code)]
pub async fn set_started_at(pool: &PgPool, job_id: Uuid, started_at: DateTime<Utc>) {
    sqlx::query("UPDATE jobs SET started_at = $2 WHERE id = $1")
        .bind(job_id)
        .bind(started_at)
        .execute(pool)
        .await
        .expect("failed to set started_at");
}
