use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall health derived from per-component reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl SystemStatus {
    /// All components healthy is `Healthy`; at or above `degraded_ratio`
    /// healthy is `Degraded`; anything worse is `Unhealthy`. An empty
    /// component set reports `Healthy`.
    pub fn derive(healthy: usize, total: usize, degraded_ratio: f64) -> Self {
        if total == 0 || healthy == total {
            return SystemStatus::Healthy;
        }
        if healthy as f64 / total as f64 >= degraded_ratio {
            SystemStatus::Degraded
        } else {
            SystemStatus::Unhealthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Healthy => "healthy",
            SystemStatus::Degraded => "degraded",
            SystemStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component's health report within a collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
}

/// What one metric source contributes to a collection cycle: a health bit
/// plus flat named gauge values.
#[derive(Debug, Clone, Default)]
pub struct ComponentSample {
    pub healthy: bool,
    pub values: HashMap<String, f64>,
}

impl ComponentSample {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            values: HashMap::new(),
        }
    }

    pub fn value(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

/// One periodic snapshot of the whole system, emitted to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub collected_at: DateTime<Utc>,
    pub status: SystemStatus,
    pub components: Vec<ComponentHealth>,
    /// Flat metric values keyed by dotted name, e.g. `cache.hit_rate`.
    pub values: HashMap<String, f64>,
}
