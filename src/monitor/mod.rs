//! Monitoring dashboard: periodic metric collection, threshold alerting,
//! and best-effort notification dispatch.

pub mod alerts;
pub mod config;
pub mod notify;
pub mod sources;
pub mod types;


pub use alerts::{
    Alert, AlertCondition, AlertEngine, AlertRule, AlertSeverity, AlertStatus, AlertTransition,
};
pub use config::{MonitorConfig, default_rules};
pub use notify::{NotificationChannel, NotificationPayload, NotifyError, SlackChannel, WebhookChannel};
pub use sources::{CacheMetricSource, MetricSource, OptimizerMetricSource, QueueMetricSource};
pub use types::{ComponentHealth, ComponentSample, DashboardMetrics, SystemStatus};

#[cfg(any(test, feature = "mock"))]
pub use notify::RecordingChannel;
#[cfg(any(test, feature = "mock"))]
pub use sources::StaticSource;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, instrument, warn};

/// Aggregates component metrics on an interval, evaluates alert rules
/// against windowed values, and fans snapshots out to subscribers.
pub struct MonitoringDashboard {
    config: MonitorConfig,
    sources: RwLock<Vec<Arc<dyn MetricSource>>>,
    channels: RwLock<Vec<Arc<dyn NotificationChannel>>>,
    engine: AlertEngine,
    history: Mutex<VecDeque<(Instant, DashboardMetrics)>>,
    snapshots: broadcast::Sender<DashboardMetrics>,
    collector_running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl MonitoringDashboard {
    pub fn new(config: MonitorConfig, rules: Vec<AlertRule>) -> Self {
        let (snapshots, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            config,
            sources: RwLock::new(Vec::new()),
            channels: RwLock::new(Vec::new()),
            engine: AlertEngine::new(rules),
            history: Mutex::new(VecDeque::new()),
            snapshots,
            collector_running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_source(&self, source: Arc<dyn MetricSource>) {
        self.sources.write().push(source);
    }

    pub fn add_channel(&self, channel: Arc<dyn NotificationChannel>) {
        self.channels.write().push(channel);
    }

    pub fn add_rule(&self, rule: AlertRule) {
        self.engine.add_rule(rule);
    }

    /// New subscription to the snapshot stream. Emission never blocks the
    /// collection cycle; a subscriber that falls behind loses old snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardMetrics> {
        self.snapshots.subscribe()
    }

    /// One collection cycle: polls every source, derives overall status,
    /// evaluates alert rules, dispatches notifications for lifecycle edges,
    /// and broadcasts the snapshot.
    #[instrument(skip(self))]
    pub fn collect_now(&self) -> DashboardMetrics {
        let sources = self.sources.read().clone();
        let mut components = Vec::with_capacity(sources.len());
        let mut values = HashMap::new();
        for source in &sources {
            let sample = source.collect();
            components.push(ComponentHealth {
                name: source.name().to_string(),
                healthy: sample.healthy,
            });
            values.extend(sample.values);
        }

        let healthy = components.iter().filter(|c| c.healthy).count();
        let status = SystemStatus::derive(healthy, components.len(), self.config.degraded_ratio);
        let snapshot = DashboardMetrics {
            collected_at: Utc::now(),
            status,
            components,
            values,
        };

        {
            let mut history = self.history.lock();
            history.push_back((Instant::now(), snapshot.clone()));
            while history.len() > self.config.history_limit {
                history.pop_front();
            }
        }

        let transitions = self.engine.evaluate(|metric, window| self.windowed(metric, window));
        for transition in &transitions {
            match transition {
                AlertTransition::Triggered(alert) => {
                    warn!(rule = %alert.rule, metric = %alert.metric, value = alert.value, "alert triggered");
                }
                AlertTransition::Resolved(alert) => {
                    info!(rule = %alert.rule, metric = %alert.metric, "alert resolved");
                }
            }
            self.dispatch(NotificationPayload::from_transition(transition));
        }

        // A send error just means nobody is subscribed right now.
        let _ = self.snapshots.send(snapshot.clone());
        debug!(status = %snapshot.status, metrics = snapshot.values.len(), "collection cycle complete");
        snapshot
    }

    /// Mean of a metric over snapshots within the window, newest included.
    fn windowed(&self, metric: &str, window: Duration) -> Option<f64> {
        let cutoff = Instant::now().checked_sub(window);
        let history = self.history.lock();
        let samples: Vec<f64> = history
            .iter()
            .filter(|(at, _)| cutoff.is_none_or(|c| *at >= c))
            .filter_map(|(_, snapshot)| snapshot.values.get(metric).copied())
            .collect();
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Fans the payload out to every channel, each in its own task with one
    /// bounded retry. Failures are logged here and never propagate.
    fn dispatch(&self, payload: NotificationPayload) {
        let channels = self.channels.read().clone();
        if channels.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available, skipping notification dispatch");
            return;
        };

        for channel in channels {
            let payload = payload.clone();
            handle.spawn(async move {
                for attempt in 1..=2u32 {
                    match channel.send(&payload).await {
                        Ok(()) => return,
                        Err(e) if attempt < 2 => {
                            warn!(channel = channel.name(), error = %e, "notification failed, retrying");
                            time::sleep(Duration::from_millis(250)).await;
                        }
                        Err(e) => {
                            warn!(channel = channel.name(), error = %e, "notification dropped");
                        }
                    }
                }
            });
        }
    }

    pub fn latest(&self) -> Option<DashboardMetrics> {
        self.history.lock().back().map(|(_, s)| s.clone())
    }

    pub fn system_status(&self) -> SystemStatus {
        self.latest()
            .map(|s| s.status)
            .unwrap_or(SystemStatus::Healthy)
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.engine.active_alerts()
    }

    pub fn alert_statuses(&self) -> Vec<AlertStatus> {
        self.engine.statuses()
    }

    pub fn acknowledge_alert(&self, id: uuid::Uuid) -> bool {
        self.engine.acknowledge(id)
    }

    pub fn resolve_alert(&self, id: uuid::Uuid) -> Option<Alert> {
        self.engine.resolve(id)
    }

    /// Starts the periodic collection loop.
    pub fn spawn_collector(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.collector_running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }

        let dashboard = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(dashboard.config.collect_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if dashboard.shutdown.load(Ordering::Acquire) {
                    break;
                }
                dashboard.collect_now();
            }
            dashboard.collector_running.store(false, Ordering::Release);
        })
    }

    pub fn stop_collector(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for MonitoringDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringDashboard")
            .field("sources", &self.sources.read().len())
            .field("channels", &self.channels.read().len())
            .field("engine", &self.engine)
            .finish()
    }
}
