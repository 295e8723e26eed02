use std::time::Duration;

use super::alerts::{AlertCondition, AlertRule};

/// Dashboard configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval of the periodic collection cycle.
    pub collect_interval: Duration,
    /// Snapshots kept for windowed alert evaluation and history queries.
    pub history_limit: usize,
    /// Healthy-component ratio at or above which the system is `degraded`
    /// rather than `unhealthy`.
    pub degraded_ratio: f64,
    /// Capacity of the snapshot broadcast channel; slow subscribers that
    /// fall further behind lose the oldest snapshots.
    pub broadcast_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            collect_interval: Duration::from_secs(30),
            history_limit: 120,
            degraded_ratio: 0.7,
            broadcast_capacity: 64,
        }
    }
}

impl MonitorConfig {
    pub fn collect_interval(mut self, interval: Duration) -> Self {
        self.collect_interval = interval;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn degraded_ratio(mut self, ratio: f64) -> Self {
        self.degraded_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }
}

/// Stock rules covering the usual operational thresholds. Hosts typically
/// start from these and tune per deployment.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "high-queue-error-rate",
            "queue.error_rate",
            AlertCondition::Gt,
            0.1,
            Duration::from_secs(300),
        ),
        AlertRule::new(
            "slow-responses",
            "optimizer.avg_response_time_ms",
            AlertCondition::Gt,
            5000.0,
            Duration::from_secs(300),
        ),
        AlertRule::new(
            "queue-backlog",
            "queue.depth",
            AlertCondition::Gt,
            1000.0,
            Duration::from_secs(120),
        ),
        AlertRule::new(
            "low-cache-hit-rate",
            "cache.hit_rate",
            AlertCondition::Lt,
            0.3,
            Duration::from_secs(600),
        ),
        AlertRule::new(
            "cache-memory-pressure",
            "cache.memory_bytes",
            AlertCondition::Gt,
            512.0 * 1024.0 * 1024.0,
            Duration::from_secs(120),
        ),
    ]
}
