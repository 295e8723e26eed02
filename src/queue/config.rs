use std::time::Duration;

/// Logical channels pre-created at manager construction. Any other queue
/// name is created lazily on first reference.
pub const PREDEFINED_CHANNELS: [&str; 5] = [
    "generation",
    "validation",
    "disagreement",
    "learning",
    "retraining",
];

/// Immutable queue manager configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Priority applied when an enqueue does not set one (mid-value).
    pub default_priority: u8,
    /// Retry budget applied when an enqueue does not set one.
    pub default_retries: u32,
    /// Base delay of the exponential retry backoff (`base * 2^attempt`).
    pub backoff_base: Duration,
    /// Bound on completed/failed history kept per queue.
    pub history_limit: usize,
    /// Worker sleep between polls when no ready work exists.
    pub poll_interval: Duration,
    /// Concurrent in-flight messages per worker.
    pub worker_concurrency: usize,
    /// A worker with no heartbeat within this window is reported unhealthy.
    pub heartbeat_timeout: Duration,
    /// How long `stop_worker` waits for in-flight work before abandoning it.
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_priority: 5,
            default_retries: 3,
            backoff_base: Duration::from_secs(1),
            history_limit: 1000,
            poll_interval: Duration::from_millis(100),
            worker_concurrency: 4,
            heartbeat_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    pub fn default_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn worker_concurrency(mut self, concurrency: usize) -> Self {
        self.worker_concurrency = concurrency.max(1);
        self
    }

    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
