use std::time::Duration;

/// Immutable cache configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one.
    pub default_ttl: Duration,
    /// Max entry count in the fast tier before LRU eviction kicks in.
    pub fast_capacity: usize,
    /// Upper bound on any fast-tier TTL; longer TTLs are clamped here while
    /// the remote tier keeps the full TTL.
    pub fast_max_ttl: Duration,
    /// Interval of the background expiry sweep.
    pub cleanup_interval: Duration,
    /// Namespace prefix applied to every remote-tier key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            fast_capacity: 10_000,
            fast_max_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            key_prefix: "concord".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn fast_capacity(mut self, capacity: usize) -> Self {
        self.fast_capacity = capacity;
        self
    }

    pub fn fast_max_ttl(mut self, ttl: Duration) -> Self {
        self.fast_max_ttl = ttl;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}
