use std::str::FromStr;
use std::time::Duration;

use crate::jobs::factory::JobStoreDriver;
use crate::jobs::runner::DEFAULT_POLL_INTERVAL;

/// Runtime configuration, read from the environment (and `.env` when present).
///
/// Most keys have a `SELLERFLOW_`-prefixed name and a short fallback.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub worker_id: String,
    pub job_store_driver: JobStoreDriver,
    /// Polling is opt-in so API-only replicas don't consume jobs.
    pub enable_job_runner: bool,
    pub poll_interval: Duration,
    pub handler_timeout: Option<Duration>,
    pub api_addr: Option<String>,
    pub migrate_on_startup: bool,
    pub pool: PoolSettings,
}

/// Postgres pool sizing. Out-of-range values are clamped, not rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    pub fn new(max_connections: Option<u32>, acquire_timeout_secs: Option<u64>) -> Self {
        Self {
            max_connections: max_connections.unwrap_or(4).clamp(1, 32),
            acquire_timeout: Duration::from_secs(acquire_timeout_secs.unwrap_or(10).clamp(1, 60)),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let worker_id = env_or_fallback("SELLERFLOW_WORKER_ID", "WORKER_ID")
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker-1".to_string());

        let job_store_driver = env_or_fallback("SELLERFLOW_JOB_STORE_DRIVER", "JOB_STORE_DRIVER")
            .unwrap_or_else(|| "db".to_string())
            .parse::<JobStoreDriver>()?;

        let enable_job_runner = env_or_fallback("SELLERFLOW_ENABLE_JOB_RUNNER", "ENABLE_JOB_RUNNER")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let poll_interval = env_parse::<u64>("SELLERFLOW_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let handler_timeout = env_value("SELLERFLOW_HANDLER_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let api_addr = env_or_fallback("SELLERFLOW_API_ADDR", "API_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_value("SELLERFLOW_MIGRATE_ON_STARTUP")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let pool = PoolSettings::new(
            env_value("SELLERFLOW_DB_MAX_CONNECTIONS").and_then(|s| s.parse().ok()),
            env_value("SELLERFLOW_DB_ACQUIRE_TIMEOUT_SECS").and_then(|s| s.parse().ok()),
        );

        Ok(Self {
            database_url,
            worker_id,
            job_store_driver,
            enable_job_runner,
            poll_interval,
            handler_timeout,
            api_addr,
            migrate_on_startup,
            pool,
        })
    }
}

/// Trimmed value of `key`; blank counts as unset.
fn env_value(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let value = raw.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    env_value(primary).or_else(|| env_value(fallback))
}

/// Unparseable values count as unset.
fn env_parse<T: FromStr>(primary: &str, fallback: &str) -> Option<T> {
    env_or_fallback(primary, fallback)?.parse().ok()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_switched_off(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "off" | "false" | "no" | "none"
    )
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let addr = value.trim();
    (!addr.is_empty() && !is_switched_off(addr)).then(|| addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_spellings() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "no", ""] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn api_addr_can_be_switched_off() {
        assert_eq!(
            normalize_optional_addr(" 0.0.0.0:8080 "),
            Some("0.0.0.0:8080".to_string())
        );
        assert_eq!(normalize_optional_addr("off"), None);
        assert_eq!(normalize_optional_addr("NONE"), None);
        assert_eq!(normalize_optional_addr("  "), None);
        assert_eq!(normalize_optional_addr("no"), None);
    }

    #[test]
    fn pool_settings_are_clamped() {
        assert_eq!(
            PoolSettings::default(),
            PoolSettings {
                max_connections: 4,
                acquire_timeout: Duration::from_secs(10),
            }
        );

        let wide = PoolSettings::new(Some(500), Some(0));
        assert_eq!(wide.max_connections, 32);
        assert_eq!(wide.acquire_timeout, Duration::from_secs(1));

        let narrow = PoolSettings::new(Some(0), Some(3600));
        assert_eq!(narrow.max_connections, 1);
        assert_eq!(narrow.acquire_timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial_test::serial]
    fn blank_primary_falls_back_and_values_are_trimmed() {
        std::env::set_var("SELLERFLOW_TEST_PRIMARY", "   ");
        std::env::set_var("SELLERFLOW_TEST_FALLBACK", " 250 ");
        assert_eq!(
            env_or_fallback("SELLERFLOW_TEST_PRIMARY", "SELLERFLOW_TEST_FALLBACK").as_deref(),
            Some("250")
        );
        assert_eq!(
            env_parse::<u64>("SELLERFLOW_TEST_PRIMARY", "SELLERFLOW_TEST_FALLBACK"),
            Some(250)
        );

        std::env::set_var("SELLERFLOW_TEST_FALLBACK", "soon");
        assert_eq!(
            env_parse::<u64>("SELLERFLOW_TEST_PRIMARY", "SELLERFLOW_TEST_FALLBACK"),
            None
        );

        std::env::remove_var("SELLERFLOW_TEST_PRIMARY");
        std::env::remove_var("SELLERFLOW_TEST_FALLBACK");
    }
}
