//! Tiered cache: fast in-process tier + shared remote tier.
//!
//! Lookup order is fast-first; a remote hit is promoted back into the fast
//! tier before being returned. Remote failures never escape `get`/`set` —
//! an unreachable remote tier degrades the cache to memory-only behavior
//! for that operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use glob::Pattern;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::fast::FastTier;
use super::remote::RemoteTier;
use super::types::{CacheStats, TierStats, estimate_size};

pub struct TieredCache {
    config: CacheConfig,
    fast: FastTier,
    remote: Option<Arc<dyn RemoteTier>>,
    remote_hits: AtomicU64,
    remote_misses: AtomicU64,
    remote_errors: AtomicU64,
    sweeper_running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl TieredCache {
    /// Creates a memory-only cache (no remote tier configured).
    pub fn memory_only(config: CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a cache backed by both tiers.
    pub fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteTier>) -> Self {
        Self::build(config, Some(remote))
    }

    fn build(config: CacheConfig, remote: Option<Arc<dyn RemoteTier>>) -> Self {
        Self {
            fast: FastTier::new(config.fast_capacity),
            config,
            remote,
            remote_hits: AtomicU64::new(0),
            remote_misses: AtomicU64::new(0),
            remote_errors: AtomicU64::new(0),
            sweeper_running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Two-tier lookup. Returns `None` on a miss in both tiers or on any
    /// lookup failure; failures are logged, never propagated.
    #[instrument(skip(self), fields(key = key))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(value) = self.fast.get(key) {
            debug!("fast tier hit");
            return self.decode(key, value);
        }

        let remote = self.remote.as_ref()?;
        match remote.get(&self.remote_key(key)).await {
            Ok(Some(raw)) => {
                self.remote_hits.fetch_add(1, Ordering::Relaxed);
                let value: Value = match serde_json::from_str(&raw) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(error = %e, "undecodable remote tier value, treating as miss");
                        return None;
                    }
                };
                // Write-through promotion. The remaining remote TTL is not
                // observable through the tier contract, so the promoted copy
                // gets the clamped default.
                let promote_ttl = self.config.default_ttl.min(self.config.fast_max_ttl);
                self.fast.insert(key, value.clone(), promote_ttl);
                debug!("remote tier hit, promoted to fast tier");
                self.decode(key, value)
            }
            Ok(None) => {
                self.remote_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.remote_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "remote tier lookup failed, degrading to miss");
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "cached value failed to deserialize, dropping entry");
                self.fast.remove(key);
                None
            }
        }
    }

    /// Writes to the fast tier with `min(ttl, fast_max_ttl)` and, when a
    /// remote tier is configured, to it with the full TTL (best-effort).
    #[instrument(skip(self, value), fields(key = key))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "unserializable value, skipping cache write");
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let fast_ttl = ttl.min(self.config.fast_max_ttl);
        self.fast.insert(key, value.clone(), fast_ttl);

        if let Some(remote) = &self.remote {
            let raw = value.to_string();
            if let Err(e) = remote.set_with_expiry(&self.remote_key(key), raw, ttl).await {
                self.remote_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "remote tier write failed, entry is memory-only");
            }
        }
    }

    /// Deletes all keys matching a glob pattern (`*` wildcard) from both
    /// tiers. Idempotent; returns the number of fast-tier entries removed.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let compiled = match Pattern::new(pattern) {
            Ok(p) => p,
            Err(e) => {
                warn!(pattern, error = %e, "invalid invalidation pattern, nothing removed");
                return 0;
            }
        };

        let removed = self.fast.remove_matching(&compiled);

        if let Some(remote) = &self.remote {
            let remote_pattern = self.remote_key(pattern);
            match remote.scan(&remote_pattern).await {
                Ok(keys) => {
                    for key in keys {
                        if let Err(e) = remote.delete(&key).await {
                            self.remote_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(key, error = %e, "remote tier delete failed during invalidation");
                        }
                    }
                }
                Err(e) => {
                    self.remote_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "remote tier scan failed during invalidation");
                }
            }
        }

        info!(pattern, removed, "cache invalidation complete");
        removed
    }

    /// Empties both tiers unconditionally.
    pub async fn clear(&self) {
        self.fast.clear();
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.flush().await {
                self.remote_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "remote tier flush failed");
            }
        }
    }

    /// Current counters. Remote entry counts require a round-trip and are
    /// reported via [`TieredCache::remote_info`]; here the remote breakdown
    /// carries hit/miss counters only.
    pub fn stats(&self) -> CacheStats {
        let fast = self.fast.stats();
        let remote = TierStats {
            hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.remote_misses.load(Ordering::Relaxed),
            entries: 0,
            size_bytes: 0,
        };

        CacheStats {
            hits: fast.hits + remote.hits,
            misses: fast.misses + remote.misses,
            evictions: self.fast.evictions(),
            expired_removals: self.fast.expired_removals(),
            entries: fast.entries,
            size_bytes: fast.size_bytes,
            fast,
            remote,
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
        }
    }

    /// Remote backend statistics, when a remote tier is configured and
    /// reachable.
    pub async fn remote_info(&self) -> Option<super::remote::RemoteTierInfo> {
        let remote = self.remote.as_ref()?;
        match remote.info().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "remote tier info unavailable");
                None
            }
        }
    }

    /// Starts the background expiry sweep (no-op if already running).
    /// The task exits when [`TieredCache::stop_sweeper`] is called.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.sweeper_running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(cache.config.cleanup_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if cache.shutdown.load(Ordering::Acquire) {
                    break;
                }
                let removed = cache.fast.remove_expired();
                if removed > 0 {
                    debug!(removed, "expiry sweep removed entries");
                }
            }
            cache.sweeper_running.store(false, Ordering::Release);
        })
    }

    /// Signals the sweeper task to exit at its next tick.
    pub fn stop_sweeper(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Approximate size of a value as it would be accounted in the cache.
    pub fn estimate_value_size<T: Serialize>(value: &T) -> usize {
        serde_json::to_value(value).map(|v| estimate_size(&v)).unwrap_or(0)
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("fast", &self.fast)
            .field("remote_configured", &self.remote.is_some())
            .finish()
    }
}
