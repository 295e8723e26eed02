//! Optimizer metric accumulators.
//!
//! Running rates use an exponentially-weighted moving average so recent
//! behavior dominates; cumulative savings counters only ever grow.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::types::OptimizationMetrics;

/// Smoothing factor: each new sample carries 10% of the estimate.
const EWMA_ALPHA: f64 = 0.1;

#[derive(Debug, Default)]
struct Ewma {
    value: f64,
    primed: bool,
}

impl Ewma {
    fn observe(&mut self, sample: f64) {
        if self.primed {
            self.value = self.value * (1.0 - EWMA_ALPHA) + sample * EWMA_ALPHA;
        } else {
            self.value = sample;
            self.primed = true;
        }
    }
}

#[derive(Debug, Default)]
struct Rates {
    cache_hit_rate: Ewma,
    avg_response_time_ms: Ewma,
    parallel_efficiency: Ewma,
}

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    rates: Mutex<Rates>,
    api_calls_avoided: AtomicU64,
    tokens_saved: AtomicU64,
    time_saved_ms: AtomicU64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        self.rates
            .lock()
            .cache_hit_rate
            .observe(if hit { 1.0 } else { 0.0 });
    }

    pub fn record_response_time(&self, elapsed_ms: f64) {
        self.rates.lock().avg_response_time_ms.observe(elapsed_ms);
    }

    /// Ratio of concurrency exploited versus the nominal ceiling.
    pub fn record_parallelism(&self, groups: usize, ceiling: usize) {
        if ceiling == 0 {
            return;
        }
        let ratio = (groups as f64 / ceiling as f64).min(1.0);
        self.rates.lock().parallel_efficiency.observe(ratio);
    }

    /// One external call avoided thanks to a cache hit.
    pub fn record_savings(&self, tokens: u64, time_ms: u64) {
        self.api_calls_avoided.fetch_add(1, Ordering::Relaxed);
        self.tokens_saved.fetch_add(tokens, Ordering::Relaxed);
        self.time_saved_ms.fetch_add(time_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OptimizationMetrics {
        let rates = self.rates.lock();
        OptimizationMetrics {
            cache_hit_rate: rates.cache_hit_rate.value,
            avg_response_time_ms: rates.avg_response_time_ms.value,
            parallel_efficiency: rates.parallel_efficiency.value,
            api_calls_avoided: self.api_calls_avoided.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            time_saved_ms: self.time_saved_ms.load(Ordering::Relaxed),
        }
    }
}
