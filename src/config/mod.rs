//! Process-level configuration, loaded from `CONCORD_*` environment
//! variables with sensible defaults. A variable that is present but
//! unparseable is an error, not a silent fallback.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::monitor::MonitorConfig;
use crate::optimizer::{OptimizerConfig, RetryPolicy};
use crate::queue::QueueConfig;

/// Top-level configuration; produces the per-component configs.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_ttl: Duration,
    pub cache_fast_capacity: usize,
    pub cache_fast_max_ttl: Duration,
    pub cache_cleanup_interval: Duration,
    pub cache_key_prefix: String,
    /// Remote cache tier endpoint; `None` runs memory-only.
    pub remote_cache_url: Option<String>,

    pub queue_default_retries: u32,
    pub queue_backoff_base: Duration,
    pub queue_worker_concurrency: usize,
    pub queue_poll_interval: Duration,
    pub queue_drain_timeout: Duration,

    pub optimizer_base_ttl: Duration,
    pub optimizer_store_capacity: usize,
    pub optimizer_parallel_threshold: usize,
    pub optimizer_max_parallel: usize,
    pub optimizer_complexity_threshold: f64,
    pub optimizer_retry_max_attempts: u32,

    pub monitor_collect_interval: Duration,
    pub monitor_history_limit: usize,

    /// Generic alert webhook endpoint.
    pub webhook_url: Option<String>,
    /// Slack incoming-webhook endpoint.
    pub slack_webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            cache_fast_capacity: 10_000,
            cache_fast_max_ttl: Duration::from_secs(300),
            cache_cleanup_interval: Duration::from_secs(60),
            cache_key_prefix: "concord".to_string(),
            remote_cache_url: None,

            queue_default_retries: 3,
            queue_backoff_base: Duration::from_secs(1),
            queue_worker_concurrency: 4,
            queue_poll_interval: Duration::from_millis(100),
            queue_drain_timeout: Duration::from_secs(30),

            optimizer_base_ttl: Duration::from_secs(3600),
            optimizer_store_capacity: 500,
            optimizer_parallel_threshold: 6,
            optimizer_max_parallel: 4,
            optimizer_complexity_threshold: 0.6,
            optimizer_retry_max_attempts: 3,

            monitor_collect_interval: Duration::from_secs(30),
            monitor_history_limit: 120,

            webhook_url: None,
            slack_webhook_url: None,
        }
    }
}

impl Config {
    pub const ENV_CACHE_TTL_SECS: &'static str = "CONCORD_CACHE_TTL_SECS";
    pub const ENV_CACHE_FAST_CAPACITY: &'static str = "CONCORD_CACHE_FAST_CAPACITY";
    pub const ENV_CACHE_FAST_MAX_TTL_SECS: &'static str = "CONCORD_CACHE_FAST_MAX_TTL_SECS";
    pub const ENV_CACHE_CLEANUP_INTERVAL_SECS: &'static str = "CONCORD_CACHE_CLEANUP_INTERVAL_SECS";
    pub const ENV_CACHE_KEY_PREFIX: &'static str = "CONCORD_CACHE_KEY_PREFIX";
    pub const ENV_REMOTE_CACHE_URL: &'static str = "CONCORD_REMOTE_CACHE_URL";

    pub const ENV_QUEUE_DEFAULT_RETRIES: &'static str = "CONCORD_QUEUE_DEFAULT_RETRIES";
    pub const ENV_QUEUE_BACKOFF_BASE_MS: &'static str = "CONCORD_QUEUE_BACKOFF_BASE_MS";
    pub const ENV_QUEUE_WORKER_CONCURRENCY: &'static str = "CONCORD_QUEUE_WORKER_CONCURRENCY";
    pub const ENV_QUEUE_POLL_INTERVAL_MS: &'static str = "CONCORD_QUEUE_POLL_INTERVAL_MS";
    pub const ENV_QUEUE_DRAIN_TIMEOUT_SECS: &'static str = "CONCORD_QUEUE_DRAIN_TIMEOUT_SECS";

    pub const ENV_OPTIMIZER_BASE_TTL_SECS: &'static str = "CONCORD_OPTIMIZER_BASE_TTL_SECS";
    pub const ENV_OPTIMIZER_STORE_CAPACITY: &'static str = "CONCORD_OPTIMIZER_STORE_CAPACITY";
    pub const ENV_OPTIMIZER_PARALLEL_THRESHOLD: &'static str =
        "CONCORD_OPTIMIZER_PARALLEL_THRESHOLD";
    pub const ENV_OPTIMIZER_MAX_PARALLEL: &'static str = "CONCORD_OPTIMIZER_MAX_PARALLEL";
    pub const ENV_OPTIMIZER_COMPLEXITY_THRESHOLD: &'static str =
        "CONCORD_OPTIMIZER_COMPLEXITY_THRESHOLD";
    pub const ENV_OPTIMIZER_RETRY_MAX_ATTEMPTS: &'static str =
        "CONCORD_OPTIMIZER_RETRY_MAX_ATTEMPTS";

    pub const ENV_MONITOR_COLLECT_INTERVAL_SECS: &'static str =
        "CONCORD_MONITOR_COLLECT_INTERVAL_SECS";
    pub const ENV_MONITOR_HISTORY_LIMIT: &'static str = "CONCORD_MONITOR_HISTORY_LIMIT";

    pub const ENV_WEBHOOK_URL: &'static str = "CONCORD_WEBHOOK_URL";
    pub const ENV_SLACK_WEBHOOK_URL: &'static str = "CONCORD_SLACK_WEBHOOK_URL";

    /// Loads and validates configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            cache_ttl: secs_var(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl)?,
            cache_fast_capacity: usize_var(
                Self::ENV_CACHE_FAST_CAPACITY,
                defaults.cache_fast_capacity,
            )?,
            cache_fast_max_ttl: secs_var(
                Self::ENV_CACHE_FAST_MAX_TTL_SECS,
                defaults.cache_fast_max_ttl,
            )?,
            cache_cleanup_interval: secs_var(
                Self::ENV_CACHE_CLEANUP_INTERVAL_SECS,
                defaults.cache_cleanup_interval,
            )?,
            cache_key_prefix: env::var(Self::ENV_CACHE_KEY_PREFIX)
                .unwrap_or(defaults.cache_key_prefix),
            remote_cache_url: url_var(Self::ENV_REMOTE_CACHE_URL)?,

            queue_default_retries: u32_var(
                Self::ENV_QUEUE_DEFAULT_RETRIES,
                defaults.queue_default_retries,
            )?,
            queue_backoff_base: millis_var(
                Self::ENV_QUEUE_BACKOFF_BASE_MS,
                defaults.queue_backoff_base,
            )?,
            queue_worker_concurrency: usize_var(
                Self::ENV_QUEUE_WORKER_CONCURRENCY,
                defaults.queue_worker_concurrency,
            )?,
            queue_poll_interval: millis_var(
                Self::ENV_QUEUE_POLL_INTERVAL_MS,
                defaults.queue_poll_interval,
            )?,
            queue_drain_timeout: secs_var(
                Self::ENV_QUEUE_DRAIN_TIMEOUT_SECS,
                defaults.queue_drain_timeout,
            )?,

            optimizer_base_ttl: secs_var(
                Self::ENV_OPTIMIZER_BASE_TTL_SECS,
                defaults.optimizer_base_ttl,
            )?,
            optimizer_store_capacity: usize_var(
                Self::ENV_OPTIMIZER_STORE_CAPACITY,
                defaults.optimizer_store_capacity,
            )?,
            optimizer_parallel_threshold: usize_var(
                Self::ENV_OPTIMIZER_PARALLEL_THRESHOLD,
                defaults.optimizer_parallel_threshold,
            )?,
            optimizer_max_parallel: usize_var(
                Self::ENV_OPTIMIZER_MAX_PARALLEL,
                defaults.optimizer_max_parallel,
            )?,
            optimizer_complexity_threshold: f64_var(
                Self::ENV_OPTIMIZER_COMPLEXITY_THRESHOLD,
                defaults.optimizer_complexity_threshold,
            )?,
            optimizer_retry_max_attempts: u32_var(
                Self::ENV_OPTIMIZER_RETRY_MAX_ATTEMPTS,
                defaults.optimizer_retry_max_attempts,
            )?,

            monitor_collect_interval: secs_var(
                Self::ENV_MONITOR_COLLECT_INTERVAL_SECS,
                defaults.monitor_collect_interval,
            )?,
            monitor_history_limit: usize_var(
                Self::ENV_MONITOR_HISTORY_LIMIT,
                defaults.monitor_history_limit,
            )?,

            webhook_url: url_var(Self::ENV_WEBHOOK_URL)?,
            slack_webhook_url: url_var(Self::ENV_SLACK_WEBHOOK_URL)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_fast_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_CACHE_FAST_CAPACITY,
                reason: "capacity must be > 0".to_string(),
            });
        }
        if self.queue_worker_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_QUEUE_WORKER_CONCURRENCY,
                reason: "concurrency must be > 0".to_string(),
            });
        }
        if self.optimizer_max_parallel == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_OPTIMIZER_MAX_PARALLEL,
                reason: "ceiling must be > 0".to_string(),
            });
        }
        if self.optimizer_retry_max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_OPTIMIZER_RETRY_MAX_ATTEMPTS,
                reason: "at least one attempt is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.optimizer_complexity_threshold) {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_OPTIMIZER_COMPLEXITY_THRESHOLD,
                reason: format!(
                    "must be within 0.0..=1.0, got {}",
                    self.optimizer_complexity_threshold
                ),
            });
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .default_ttl(self.cache_ttl)
            .fast_capacity(self.cache_fast_capacity)
            .fast_max_ttl(self.cache_fast_max_ttl)
            .cleanup_interval(self.cache_cleanup_interval)
            .key_prefix(self.cache_key_prefix.clone())
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::default()
            .default_retries(self.queue_default_retries)
            .backoff_base(self.queue_backoff_base)
            .worker_concurrency(self.queue_worker_concurrency)
            .poll_interval(self.queue_poll_interval)
            .drain_timeout(self.queue_drain_timeout)
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::default()
            .base_ttl(self.optimizer_base_ttl)
            .store_capacity(self.optimizer_store_capacity)
            .parallel_threshold(self.optimizer_parallel_threshold)
            .max_parallel(self.optimizer_max_parallel)
            .complexity_threshold(self.optimizer_complexity_threshold)
            .retry(RetryPolicy {
                max_attempts: self.optimizer_retry_max_attempts,
                ..RetryPolicy::default()
            })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::default()
            .collect_interval(self.monitor_collect_interval)
            .history_limit(self.monitor_history_limit)
    }
}

fn u32_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|source| ConfigError::NumberParseError {
                name,
                value,
                source,
            }),
        Err(_) => Ok(default),
    }
}

fn usize_var(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|source| ConfigError::NumberParseError {
                name,
                value,
                source,
            }),
        Err(_) => Ok(default),
    }
}

fn f64_var(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|source| ConfigError::FloatParseError {
                name,
                value,
                source,
            }),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(u64_var(
        name,
        default.as_secs(),
    )?))
}

fn millis_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_millis(u64_var(
        name,
        default.as_millis() as u64,
    )?))
}

fn u64_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|source| ConfigError::NumberParseError {
                name,
                value,
                source,
            }),
        Err(_) => Ok(default),
    }
}

fn url_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => {
            if value.starts_with("http://") || value.starts_with("https://") {
                Ok(Some(value))
            } else {
                Err(ConfigError::InvalidUrl { name, value })
            }
        }
        Err(_) => Ok(None),
    }
}
