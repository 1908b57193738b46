use std::env;
use std::sync::Arc;
use uuid::Uuid;

use sellerflow::config::Config;
use sellerflow::jobs::{JobStatus, JobStoreFactory};
use sellerflow::sync::{SyncTriggers, TenantsRepo, TriggerOutcome};
use sellerflow::{db, telemetry};

const USAGE: &str = "sellerctl <command>\n\
Commands:\n\
- migrate              apply database migrations\n\
- auto-sync            enqueue background syncs for tenants past the 24h window (cron)\n\
- sync <tenant_id>     request a manual tenant sync\n\
- job <job_id>         print a job as JSON\n\
- counts               job counts per status\n\
\n\
Uses DATABASE_URL and JOB_STORE_DRIVER.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let cfg = Config::from_env()?;
    let pool = db::make_pool(&cfg.database_url, cfg.pool).await?;

    if command == "migrate" {
        db::run_migrations(&pool).await?;
        println!("migrations applied");
        return Ok(());
    }

    let factory = JobStoreFactory::new(cfg.job_store_driver, pool.clone());
    let jobs = factory.store().await;
    let tenants = Arc::new(TenantsRepo::new(pool.clone()));
    let triggers = SyncTriggers::new(jobs.clone(), tenants);

    match command.as_str() {
        "auto-sync" => {
            let n = triggers.enqueue_due_auto_syncs().await?;
            println!("enqueued {n} auto sync job(s)");
        }
        "sync" => {
            let tenant_id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: sellerctl sync <tenant_id>"))?;
            match triggers.request_manual_sync(tenant_id).await? {
                TriggerOutcome::Enqueued { job_id } => println!("enqueued job {job_id}"),
                TriggerOutcome::Cooldown {
                    retry_after_seconds,
                } => println!("tenant {tenant_id} is in cooldown, retry in {retry_after_seconds}s"),
            }
        }
        "job" => {
            let id: Uuid = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: sellerctl job <job_id>"))?
                .parse()?;
            match jobs.get_job(id).await? {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => {
                    eprintln!("job {id} not found");
                    std::process::exit(1);
                }
            }
        }
        "counts" => {
            let counts = jobs.count_by_status().await?;
            let line: Vec<String> = JobStatus::ALL
                .iter()
                .map(|s| format!("{}={}", s.as_str(), counts.get(s).copied().unwrap_or(0)))
                .collect();
            println!("jobs: {}", line.join(" "));
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
