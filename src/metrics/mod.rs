//! Metrics emit contract.
//!
//! The core never depends on a concrete metrics backend, only on
//! [`MetricsSink`]. [`InMemoryMetrics`] is the default recorder; the
//! monitoring dashboard reads its snapshot each collection cycle. A host
//! application can substitute its own sink (statsd, OTLP, ...) by
//! implementing the trait.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Counter / timing / gauge emit contract consumed by every core component.
///
/// Implementations must be cheap and non-blocking; emission happens on hot
/// paths and must never suspend the emitting operation.
pub trait MetricsSink: Send + Sync {
    /// Adds `value` to the named counter.
    fn increment(&self, name: &str, value: u64);

    /// Records one timing/distribution sample.
    fn histogram(&self, name: &str, value: f64);

    /// Sets the named gauge to `value`.
    fn gauge(&self, name: &str, value: f64);
}

/// Point-in-time view of everything an [`InMemoryMetrics`] has recorded.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    /// Per-histogram (count, sum); enough to derive averages.
    pub histograms: HashMap<String, (u64, f64)>,
}

impl MetricsSnapshot {
    /// Returns the counter value, 0 when never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Returns the gauge value, if ever set.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).copied()
    }

    /// Returns the mean of a histogram, if it has samples.
    pub fn histogram_mean(&self, name: &str) -> Option<f64> {
        self.histograms
            .get(name)
            .filter(|(count, _)| *count > 0)
            .map(|(count, sum)| sum / *count as f64)
    }
}

/// Process-local metrics recorder.
#[derive(Default)]
pub struct InMemoryMetrics {
    counters: RwLock<HashMap<String, u64>>,
    gauges: RwLock<HashMap<String, f64>>,
    histograms: RwLock<HashMap<String, (u64, f64)>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder already wrapped for injection.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Copies out the current state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.read().clone(),
            gauges: self.gauges.read().clone(),
            histograms: self.histograms.read().clone(),
        }
    }

    /// Clears all recorded values.
    pub fn reset(&self) {
        self.counters.write().clear();
        self.gauges.write().clear();
        self.histograms.write().clear();
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(&self, name: &str, value: u64) {
        *self.counters.write().entry(name.to_string()).or_insert(0) += value;
    }

    fn histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write();
        let entry = histograms.entry(name.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += value;
    }

    fn gauge(&self, name: &str, value: f64) {
        self.gauges.write().insert(name.to_string(), value);
    }
}

impl std::fmt::Debug for InMemoryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMetrics")
            .field("counters", &self.counters.read().len())
            .field("gauges", &self.gauges.read().len())
            .field("histograms", &self.histograms.read().len())
            .finish()
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &str, _value: u64) {}
    fn histogram(&self, _name: &str, _value: f64) {}
    fn gauge(&self, _name: &str, _value: f64) {}
}
