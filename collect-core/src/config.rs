use std::env;
use std::time::Duration;

/// Central tunables for the ingestion pipeline, loaded from the process
/// environment at start with `dotenvy` picking up a local `.env` file first.
/// Every option has a documented default; a missing or unparseable value
/// falls back to that default rather than panicking.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// `submit-inventory` payload cap, in bytes.
    pub max_request_size: u64,
    /// Payloads at or above this size are logged with a warning, not
    /// rejected. Kept configurable per the Open Question in the design
    /// notes, rather than a hard-coded 1 MiB constant.
    pub large_payload_warn_bytes: u64,

    /// Batch Persister accumulation.
    pub batch_size: usize,
    pub flush_interval: Duration,

    /// Worker pool sizes.
    pub processing_workers: usize,
    pub notification_workers: usize,

    /// Duration for low/medium severity diff retention and snapshot
    /// rotation; high/critical diffs survive `2 * base_retention`.
    pub base_retention: Duration,
    /// Minimum snapshots preserved per tenant regardless of age.
    pub min_retained_per_tenant: usize,
    /// Cleanup Worker cadence.
    pub cleanup_interval: Duration,

    /// Lifecycle.
    pub heartbeat_interval: Duration,
    pub shutdown_timeout: Duration,

    /// Retry policy.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter: f64,

    /// Backpressure / circuit breaker.
    pub drop_threshold: f64,
    pub circuit_max_failures: u32,
    pub circuit_reset: Duration,
    pub local_buffer_capacity: usize,

    /// Intake -> Inventory queue.
    pub enqueue_timeout: Duration,

    /// Per-operation timeouts named in the concurrency model.
    pub batch_flush_timeout: Duration,
    pub diff_transaction_timeout: Duration,
    pub single_row_update_timeout: Duration,
    pub diff_computation_timeout: Duration,
    pub upstream_http_timeout: Duration,

    /// Metrics collection cadence for the Worker Manager.
    pub metrics_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_request_size: 10 * 1024 * 1024,
            large_payload_warn_bytes: 1024 * 1024,
            batch_size: 100,
            flush_interval: Duration::from_secs(2),
            processing_workers: 4,
            notification_workers: 4,
            base_retention: Duration::from_secs(30 * 24 * 3600),
            min_retained_per_tenant: 5,
            cleanup_interval: Duration::from_secs(3600),
            heartbeat_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
            jitter: 0.2,
            drop_threshold: 0.8,
            circuit_max_failures: 5,
            circuit_reset: Duration::from_secs(30),
            local_buffer_capacity: 1000,
            enqueue_timeout: Duration::from_secs(5),
            batch_flush_timeout: Duration::from_secs(30),
            diff_transaction_timeout: Duration::from_secs(10),
            single_row_update_timeout: Duration::from_secs(5),
            diff_computation_timeout: Duration::from_secs(60),
            upstream_http_timeout: Duration::from_secs(30),
            metrics_interval: Duration::from_secs(15),
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            max_request_size: env_u64("MAX_REQUEST_SIZE", defaults.max_request_size),
            large_payload_warn_bytes: env_u64(
                "LARGE_PAYLOAD_WARN_BYTES",
                defaults.large_payload_warn_bytes,
            ),
            batch_size: env_usize("BATCH_SIZE", defaults.batch_size),
            flush_interval: env_duration("FLUSH_INTERVAL", defaults.flush_interval),
            processing_workers: env_usize("PROCESSING_WORKERS", defaults.processing_workers),
            notification_workers: env_usize("NOTIFICATION_WORKERS", defaults.notification_workers),
            base_retention: env_duration("BASE_RETENTION", defaults.base_retention),
            min_retained_per_tenant: env_usize(
                "MIN_RETAINED_PER_TENANT",
                defaults.min_retained_per_tenant,
            ),
            cleanup_interval: env_duration("CLEANUP_INTERVAL", defaults.cleanup_interval),
            heartbeat_interval: env_duration("HEARTBEAT_INTERVAL", defaults.heartbeat_interval),
            shutdown_timeout: env_duration("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            max_attempts: env_u32("MAX_ATTEMPTS", defaults.max_attempts),
            backoff_base: env_duration("BACKOFF_BASE", defaults.backoff_base),
            backoff_max: env_duration("BACKOFF_MAX", defaults.backoff_max),
            jitter: env_f64("JITTER", defaults.jitter),
            drop_threshold: env_f64("DROP_THRESHOLD", defaults.drop_threshold),
            circuit_max_failures: env_u32("CIRCUIT_MAX_FAILURES", defaults.circuit_max_failures),
            circuit_reset: env_duration("CIRCUIT_RESET", defaults.circuit_reset),
            local_buffer_capacity: env_usize(
                "LOCAL_BUFFER_CAPACITY",
                defaults.local_buffer_capacity,
            ),
            enqueue_timeout: env_duration("ENQUEUE_TIMEOUT", defaults.enqueue_timeout),
            batch_flush_timeout: env_duration("BATCH_FLUSH_TIMEOUT", defaults.batch_flush_timeout),
            diff_transaction_timeout: env_duration(
                "DIFF_TRANSACTION_TIMEOUT",
                defaults.diff_transaction_timeout,
            ),
            single_row_update_timeout: env_duration(
                "SINGLE_ROW_UPDATE_TIMEOUT",
                defaults.single_row_update_timeout,
            ),
            diff_computation_timeout: env_duration(
                "DIFF_COMPUTATION_TIMEOUT",
                defaults.diff_computation_timeout,
            ),
            upstream_http_timeout: env_duration(
                "UPSTREAM_HTTP_TIMEOUT",
                defaults.upstream_http_timeout,
            ),
            metrics_interval: env_duration("METRICS_INTERVAL", defaults.metrics_interval),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| humantime::parse_duration(&v).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = RetentionConfig::default();
        assert!(cfg.backoff_max >= cfg.backoff_base);
        assert!(cfg.drop_threshold > 0.0 && cfg.drop_threshold <= 1.0);
    }
}
