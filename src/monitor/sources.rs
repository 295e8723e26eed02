//! Metric sources the dashboard polls each collection cycle.
//!
//! Each adapter reads the component's own counters; collection never blocks
//! on external I/O.

use std::sync::Arc;

use crate::cache::TieredCache;
use crate::optimizer::FeedbackLoopOptimizer;
use crate::queue::QueueManager;

use super::types::ComponentSample;

/// A pollable component. `collect` must be cheap and non-blocking.
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &str;
    fn collect(&self) -> ComponentSample;
}

pub struct CacheMetricSource {
    cache: Arc<TieredCache>,
}

impl CacheMetricSource {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }
}

impl MetricSource for CacheMetricSource {
    fn name(&self) -> &str {
        "cache"
    }

    fn collect(&self) -> ComponentSample {
        let stats = self.cache.stats();
        ComponentSample::healthy()
            .value("cache.hit_rate", stats.hit_rate())
            .value("cache.entries", stats.entries as f64)
            .value("cache.memory_bytes", stats.size_bytes as f64)
            .value("cache.evictions", stats.evictions as f64)
            .value("cache.remote_errors", stats.remote_errors as f64)
    }
}

pub struct QueueMetricSource {
    queues: Arc<QueueManager>,
}

impl QueueMetricSource {
    pub fn new(queues: Arc<QueueManager>) -> Self {
        Self { queues }
    }
}

impl MetricSource for QueueMetricSource {
    fn name(&self) -> &str {
        "queues"
    }

    fn collect(&self) -> ComponentSample {
        let all = self.queues.all_stats();
        let mut sample = ComponentSample {
            healthy: !self.queues.is_shutting_down(),
            ..ComponentSample::default()
        };

        let mut depth = 0u64;
        let mut completed = 0u64;
        let mut failed = 0u64;
        for stats in &all {
            depth += (stats.pending + stats.processing) as u64;
            completed += stats.completed;
            failed += stats.failed;
            sample
                .values
                .insert(format!("queue.{}.depth", stats.name), stats.pending as f64);
        }

        let processed = completed + failed;
        let error_rate = if processed == 0 {
            0.0
        } else {
            failed as f64 / processed as f64
        };
        sample.values.insert("queue.depth".to_string(), depth as f64);
        sample
            .values
            .insert("queue.error_rate".to_string(), error_rate);
        sample
            .values
            .insert("queue.failed".to_string(), failed as f64);
        sample
    }
}

pub struct OptimizerMetricSource {
    optimizer: Arc<FeedbackLoopOptimizer>,
}

impl OptimizerMetricSource {
    pub fn new(optimizer: Arc<FeedbackLoopOptimizer>) -> Self {
        Self { optimizer }
    }
}

impl MetricSource for OptimizerMetricSource {
    fn name(&self) -> &str {
        "optimizer"
    }

    fn collect(&self) -> ComponentSample {
        let snapshot = self.optimizer.metrics_snapshot();
        ComponentSample::healthy()
            .value("optimizer.cache_hit_rate", snapshot.cache_hit_rate)
            .value(
                "optimizer.avg_response_time_ms",
                snapshot.avg_response_time_ms,
            )
            .value(
                "optimizer.parallel_efficiency",
                snapshot.parallel_efficiency,
            )
            .value(
                "optimizer.api_calls_avoided",
                snapshot.api_calls_avoided as f64,
            )
            .value("optimizer.tokens_saved", snapshot.tokens_saved as f64)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::StaticSource;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use parking_lot::Mutex;

    use crate::monitor::types::ComponentSample;

    use super::MetricSource;

    /// Reports a settable fixed sample; for dashboard tests.
    pub struct StaticSource {
        name: String,
        sample: Mutex<ComponentSample>,
    }

    impl StaticSource {
        pub fn new(name: &str, sample: ComponentSample) -> Self {
            Self {
                name: name.to_string(),
                sample: Mutex::new(sample),
            }
        }

        pub fn set_sample(&self, sample: ComponentSample) {
            *self.sample.lock() = sample;
        }
    }

    impl MetricSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn collect(&self) -> ComponentSample {
            self.sample.lock().clone()
        }
    }
}
