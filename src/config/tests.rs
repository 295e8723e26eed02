use std::env;

use serial_test::serial;

use super::{Config, ConfigError};

/// Runs `f` with the given env vars set, restoring the previous state after.
fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(name, _)| (name.to_string(), env::var(name).ok()))
        .collect();
    for (name, value) in vars {
        unsafe { env::set_var(name, value) };
    }
    f();
    for (name, value) in previous {
        match value {
            Some(value) => unsafe { env::set_var(&name, value) },
            None => unsafe { env::remove_var(&name) },
        }
    }
}

#[test]
#[serial]
fn test_defaults_without_env() {
    let config = Config::from_env().unwrap();
    assert_eq!(config.cache_fast_capacity, 10_000);
    assert_eq!(config.queue_default_retries, 3);
    assert_eq!(config.optimizer_max_parallel, 4);
    assert!(config.remote_cache_url.is_none());
}

#[test]
#[serial]
fn test_env_overrides_applied() {
    with_env_vars(
        &[
            (Config::ENV_CACHE_FAST_CAPACITY, "250"),
            (Config::ENV_QUEUE_BACKOFF_BASE_MS, "2500"),
            (Config::ENV_OPTIMIZER_COMPLEXITY_THRESHOLD, "0.8"),
            (Config::ENV_CACHE_KEY_PREFIX, "staging"),
        ],
        || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.cache_fast_capacity, 250);
            assert_eq!(config.queue_backoff_base.as_millis(), 2500);
            assert_eq!(config.optimizer_complexity_threshold, 0.8);
            assert_eq!(config.cache_key_prefix, "staging");
        },
    );
}

#[test]
#[serial]
fn test_unparseable_number_is_an_error() {
    with_env_vars(&[(Config::ENV_CACHE_FAST_CAPACITY, "lots")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::NumberParseError { .. }));
    });
}

#[test]
#[serial]
fn test_unparseable_float_is_an_error() {
    with_env_vars(
        &[(Config::ENV_OPTIMIZER_COMPLEXITY_THRESHOLD, "high")],
        || {
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::FloatParseError { .. }));
        },
    );
}

#[test]
#[serial]
fn test_invalid_url_rejected() {
    with_env_vars(&[(Config::ENV_REMOTE_CACHE_URL, "not-a-url")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    });
}

#[test]
#[serial]
fn test_empty_url_means_unset() {
    with_env_vars(&[(Config::ENV_SLACK_WEBHOOK_URL, "")], || {
        let config = Config::from_env().unwrap();
        assert!(config.slack_webhook_url.is_none());
    });
}

#[test]
#[serial]
fn test_out_of_range_threshold_rejected() {
    with_env_vars(
        &[(Config::ENV_OPTIMIZER_COMPLEXITY_THRESHOLD, "1.5")],
        || {
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { .. }));
        },
    );
}

#[test]
#[serial]
fn test_zero_concurrency_rejected() {
    with_env_vars(&[(Config::ENV_QUEUE_WORKER_CONCURRENCY, "0")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    });
}

#[test]
#[serial]
fn test_component_configs_inherit_values() {
    with_env_vars(
        &[
            (Config::ENV_CACHE_TTL_SECS, "120"),
            (Config::ENV_QUEUE_DRAIN_TIMEOUT_SECS, "5"),
            (Config::ENV_OPTIMIZER_RETRY_MAX_ATTEMPTS, "7"),
            (Config::ENV_MONITOR_HISTORY_LIMIT, "10"),
        ],
        || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.cache_config().default_ttl.as_secs(), 120);
            assert_eq!(config.queue_config().drain_timeout.as_secs(), 5);
            assert_eq!(config.optimizer_config().retry.max_attempts, 7);
            assert_eq!(config.monitor_config().history_limit, 10);
        },
    );
}
