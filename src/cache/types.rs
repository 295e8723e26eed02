use std::time::Instant;

use serde_json::Value;

/// A single fast-tier entry.
///
/// `last_accessed` is refreshed on every read and drives LRU eviction;
/// `size_bytes` is the serialized length, an approximation for reporting,
/// not an exact memory accounting.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(value: Value, expires_at: Instant) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            value,
            expires_at,
            last_accessed: Instant::now(),
            size_bytes,
        }
    }

    /// Returns `true` if the entry has passed its expiry.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Serialized-length size estimate for a JSON payload.
#[inline]
pub fn estimate_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Per-tier hit/miss breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub size_bytes: u64,
}

/// Aggregate cache statistics across both tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
    pub entries: u64,
    pub size_bytes: u64,
    pub fast: TierStats,
    pub remote: TierStats,
    pub remote_errors: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, 0.0 when there are no samples.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}
