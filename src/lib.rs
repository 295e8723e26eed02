//! Concord: a dual-model feedback-loop optimization layer.
//!
//! Sits between a host application and its two external inference stages
//! (generation and validation) and minimizes redundant external work.
//!
//! # Public API Surface
//!
//! ## Cache
//! - [`TieredCache`], [`CacheConfig`], [`CacheStats`] - Two-tier response
//!   cache (fast in-process tier plus optional remote tier)
//! - [`RemoteTier`] - Boundary trait for the shared remote tier
//!
//! ## Queues
//! - [`QueueManager`], [`QueueConfig`] - Named priority queues with delayed
//!   and TTL'd messages, retry with exponential backoff
//! - [`QueueProcessor`] - Worker callback trait
//!
//! ## Optimizer
//! - [`FeedbackLoopOptimizer`], [`OptimizerConfig`] - Caching, coalescing,
//!   batching, parallel validation, tier routing, adaptive retry
//! - [`Generator`], [`Validator`] - Boundary traits for the inference stages
//!
//! ## Monitoring
//! - [`MonitoringDashboard`], [`MonitorConfig`] - Periodic collection,
//!   threshold alerting, best-effort notifications
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod hashing;
pub mod metrics;
pub mod monitor;
pub mod optimizer;
pub mod queue;

pub use cache::{
    CacheConfig, CacheEntry, CacheStats, RemoteTier, RemoteTierError, RemoteTierInfo,
    RemoteTierResult, TierStats, TieredCache,
};
#[cfg(any(test, feature = "mock"))]
pub use cache::MockRemoteTier;

pub use config::{Config, ConfigError};
pub use hashing::{generation_key, hash_to_u64, validation_key};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};

pub use monitor::{
    Alert, AlertCondition, AlertRule, AlertSeverity, AlertStatus, CacheMetricSource,
    ComponentHealth, ComponentSample, DashboardMetrics, MetricSource, MonitorConfig,
    MonitoringDashboard, NotificationChannel, NotificationPayload, OptimizerMetricSource,
    QueueMetricSource, SlackChannel, SystemStatus, WebhookChannel, default_rules,
};
#[cfg(any(test, feature = "mock"))]
pub use monitor::{RecordingChannel, StaticSource};

pub use optimizer::{
    CollaboratorError, DisagreementEvent, FeedbackLoopOptimizer, GenerationRequest,
    GenerationResponse, Generator,
    ModelTier, NodeVerdict, OptimizationMetrics, OptimizerConfig, OptimizerError, OptimizerResult,
    Priority, RetryPolicy, RevisionRequest, ValidationResponse, Validator,
};
#[cfg(any(test, feature = "mock"))]
pub use optimizer::{MockGenerator, MockValidator};

pub use queue::{
    EnqueueOptions, FailedMessage, PREDEFINED_CHANNELS, ProcessError, QueueConfig, QueueError,
    QueueManager, QueueMessage, QueueProcessor, QueueResult, QueueStats, shutdown_signal,
};

/// Installs the global tracing subscriber, filtered by `RUST_LOG`. Intended
/// to be called once at host-process startup; subsequent calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
