/// Runtime configuration for the worker and admin surfaces, read from the
/// environment. The DSN is not part of this: the binaries take it as their
/// sole positional argument.
#[derive(Clone, Debug)]
pub struct Config {
    pub num_workers: usize,
    pub batch_size: i64,
    pub poll_interval_ms: u64,
    pub topic: Option<String>,
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let num_workers = env_or_fallback("PGJOBS_NUM_WORKERS", "NUM_WORKERS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let batch_size = env_or_fallback("PGJOBS_BATCH_SIZE", "BATCH_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let poll_interval_ms = env_or_fallback("PGJOBS_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let topic = env_or_fallback("PGJOBS_TOPIC", "TOPIC");

        let admin_addr = env_or_fallback("PGJOBS_ADMIN_ADDR", "ADMIN_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_bool("PGJOBS_MIGRATE_ON_STARTUP").unwrap_or(false);

        Self {
            num_workers,
            batch_size,
            poll_interval_ms,
            topic,
            admin_addr,
            migrate_on_startup,
        }
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
