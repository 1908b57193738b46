use sellerflow::api;
use sellerflow::config;
use sellerflow::db;
use sellerflow::jobs::{JobRunner, JobStoreFactory};
use sellerflow::sync::{TenantStore, TenantsRepo};
use sellerflow::telemetry;

use std::sync::Arc;
use tracing::{info, warn};

mod handlers;
use handlers::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let cfg = config::Config::from_env()?;

    info!(
        worker_id = %cfg.worker_id,
        driver = %cfg.job_store_driver,
        job_runner = cfg.enable_job_runner,
        poll_interval_ms = cfg.poll_interval.as_millis() as u64,
        handler_timeout_secs = cfg.handler_timeout.map(|d| d.as_secs()),
        api = cfg.api_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        "sellerflow worker starting"
    );

    let pool = db::make_pool(&cfg.database_url, cfg.pool).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let factory = JobStoreFactory::new(cfg.job_store_driver, pool.clone());
    let jobs = factory.store().await;
    let tenants: Arc<dyn TenantStore> = Arc::new(TenantsRepo::new(pool.clone()));

    // ---- Runner ----
    let registry = build_registry(jobs.clone(), tenants.clone(), cfg.handler_timeout);
    let runner = JobRunner::new(jobs.clone(), Arc::new(registry))
        .with_poll_interval(cfg.poll_interval);

    let runner_handle = if cfg.enable_job_runner {
        runner.start()
    } else {
        info!("job runner disabled (set ENABLE_JOB_RUNNER=true to poll)");
        None
    };

    // ---- API task ----
    let app = api::router(api::ApiState::new(jobs.clone(), tenants.clone()));
    let api_addr = cfg.api_addr.clone();
    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, "trigger api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        res = api_handle => res??,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("shutdown requested");
        }
    }

    if runner.stop() {
        if let Some(handle) = runner_handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "job runner task ended abnormally");
            }
        }
    }

    Ok(())
}
