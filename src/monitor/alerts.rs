//! Threshold rules and alert lifecycle.
//!
//! A rule is bound at configuration time; the engine re-evaluates every rule
//! against windowed metric values each collection cycle. An alert transitions
//! inactive→active exactly once per breach episode and back once the metric
//! returns within bounds; `trigger_count` only moves on the inactive→active
//! edge. An alert is never simultaneously active and resolved.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison applied between the windowed metric value and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Gt,
    Lt,
    Eq,
    Ne,
}

impl AlertCondition {
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Gt => value > threshold,
            AlertCondition::Lt => value < threshold,
            AlertCondition::Eq => (value - threshold).abs() < f64::EPSILON,
            AlertCondition::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// A threshold rule, bound at configuration time.
#[derive(Debug, Clone)]
pub struct AlertRule {
    /// Unique rule name; also keys the alert's lifecycle state.
    pub name: String,
    /// Metric this rule watches, by dotted name.
    pub metric: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    /// Samples within this window are averaged before comparison.
    pub time_window: Duration,
}

impl AlertRule {
    pub fn new(
        name: &str,
        metric: &str,
        condition: AlertCondition,
        threshold: f64,
        time_window: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            metric: metric.to_string(),
            condition,
            threshold,
            time_window,
        }
    }

    /// Breaches far past the threshold escalate to critical.
    fn severity(&self, value: f64) -> AlertSeverity {
        let excess = match self.condition {
            AlertCondition::Gt => {
                if self.threshold.abs() > f64::EPSILON {
                    (value - self.threshold) / self.threshold.abs()
                } else {
                    value
                }
            }
            AlertCondition::Lt => {
                if self.threshold.abs() > f64::EPSILON {
                    (self.threshold - value) / self.threshold.abs()
                } else {
                    -value
                }
            }
            AlertCondition::Eq | AlertCondition::Ne => 0.0,
        };
        if excess >= 0.5 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        }
    }
}

/// An active (or historical) alert instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule: String,
    pub metric: String,
    /// The windowed value that breached the threshold.
    pub value: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Read-model over a rule's lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStatus {
    pub rule: String,
    pub active: bool,
    pub trigger_count: u64,
    pub last_triggered: Option<DateTime<Utc>>,
}

/// A lifecycle edge produced by one evaluation pass.
#[derive(Debug, Clone)]
pub enum AlertTransition {
    Triggered(Alert),
    Resolved(Alert),
}

#[derive(Debug, Default)]
struct RuleState {
    active_alert: Option<Alert>,
    trigger_count: u64,
    last_triggered: Option<DateTime<Utc>>,
}

/// Evaluates rules and owns alert lifecycle state.
#[derive(Default)]
pub struct AlertEngine {
    rules: Mutex<Vec<AlertRule>>,
    states: Mutex<HashMap<String, RuleState>>,
}

impl AlertEngine {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_rule(&self, rule: AlertRule) {
        self.rules.lock().push(rule);
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.lock().clone()
    }

    /// One evaluation pass. `windowed` resolves a metric name and window to
    /// its averaged value; a rule whose metric has no samples is skipped.
    /// Returns the lifecycle edges this pass produced.
    pub fn evaluate<F>(&self, windowed: F) -> Vec<AlertTransition>
    where
        F: Fn(&str, Duration) -> Option<f64>,
    {
        let rules = self.rules.lock().clone();
        let mut states = self.states.lock();
        let mut transitions = Vec::new();

        for rule in rules {
            let Some(value) = windowed(&rule.metric, rule.time_window) else {
                continue;
            };
            let state = states.entry(rule.name.clone()).or_default();
            let breached = rule.condition.matches(value, rule.threshold);

            match (&state.active_alert, breached) {
                (None, true) => {
                    let alert = Alert {
                        id: Uuid::new_v4(),
                        rule: rule.name.clone(),
                        metric: rule.metric.clone(),
                        value,
                        threshold: rule.threshold,
                        severity: rule.severity(value),
                        triggered_at: Utc::now(),
                        acknowledged: false,
                        resolved_at: None,
                    };
                    state.trigger_count += 1;
                    state.last_triggered = Some(alert.triggered_at);
                    state.active_alert = Some(alert.clone());
                    transitions.push(AlertTransition::Triggered(alert));
                }
                (Some(_), false) => {
                    if let Some(mut alert) = state.active_alert.take() {
                        alert.resolved_at = Some(Utc::now());
                        transitions.push(AlertTransition::Resolved(alert));
                    }
                }
                // Still breached or still quiet: no edge, no re-trigger.
                _ => {}
            }
        }

        transitions
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.states
            .lock()
            .values()
            .filter_map(|s| s.active_alert.clone())
            .collect()
    }

    /// Marks an active alert as seen without removing it. Returns `false`
    /// when no active alert has that id.
    pub fn acknowledge(&self, id: Uuid) -> bool {
        let mut states = self.states.lock();
        for state in states.values_mut() {
            if let Some(alert) = &mut state.active_alert {
                if alert.id == id {
                    alert.acknowledged = true;
                    return true;
                }
            }
        }
        false
    }

    /// Operator resolution: removes the alert from the active set and stamps
    /// its resolution time.
    pub fn resolve(&self, id: Uuid) -> Option<Alert> {
        let mut states = self.states.lock();
        for state in states.values_mut() {
            if state.active_alert.as_ref().is_some_and(|a| a.id == id) {
                let mut alert = state.active_alert.take()?;
                alert.resolved_at = Some(Utc::now());
                return Some(alert);
            }
        }
        None
    }

    pub fn statuses(&self) -> Vec<AlertStatus> {
        let states = self.states.lock();
        self.rules
            .lock()
            .iter()
            .map(|rule| {
                let state = states.get(&rule.name);
                AlertStatus {
                    rule: rule.name.clone(),
                    active: state.is_some_and(|s| s.active_alert.is_some()),
                    trigger_count: state.map(|s| s.trigger_count).unwrap_or(0),
                    last_triggered: state.and_then(|s| s.last_triggered),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("rules", &self.rules.lock().len())
            .field("active", &self.active_alerts().len())
            .finish()
    }
}
