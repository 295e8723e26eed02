use std::time::Duration;

use super::retry::RetryPolicy;

/// Immutable optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Base of the dynamic TTL: `base_ttl * confidence * priority_multiplier`.
    pub base_ttl: Duration,
    /// Size cap of the optimizer-private response store (insertion-order
    /// eviction past this point).
    pub store_capacity: usize,
    /// Interval of the store's background expiry sweep.
    pub sweep_interval: Duration,
    /// Node count at or above which validation goes parallel.
    pub parallel_threshold: usize,
    /// Nominal ceiling on concurrent validation groups.
    pub max_parallel: usize,
    /// Node count at or above which validation batches related nodes.
    pub batch_threshold: usize,
    /// Nodes per batch group.
    pub batch_size: usize,
    /// Complexity score at or above which generation routes to the
    /// high-performance tier.
    pub complexity_threshold: f64,
    /// Generator confidence at or above which failing verdicts count as a
    /// generator/validator disagreement.
    pub disagreement_confidence: f64,
    /// Retry schedule for external generation/validation calls.
    pub retry: RetryPolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            base_ttl: Duration::from_secs(3600),
            store_capacity: 500,
            sweep_interval: Duration::from_secs(60),
            parallel_threshold: 6,
            max_parallel: 4,
            batch_threshold: 3,
            batch_size: 3,
            complexity_threshold: 0.6,
            disagreement_confidence: 0.7,
            retry: RetryPolicy::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn base_ttl(mut self, ttl: Duration) -> Self {
        self.base_ttl = ttl;
        self
    }

    pub fn store_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = capacity;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    pub fn max_parallel(mut self, ceiling: usize) -> Self {
        self.max_parallel = ceiling.max(1);
        self
    }

    pub fn batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold.max(1);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn complexity_threshold(mut self, threshold: f64) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    pub fn disagreement_confidence(mut self, confidence: f64) -> Self {
        self.disagreement_confidence = confidence;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
