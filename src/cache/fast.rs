//! Fast in-process tier.
//!
//! A `parking_lot`-guarded map with per-entry TTL and strict
//! least-recently-accessed eviction. Eviction is scan-based: capacity here
//! is bounded (tens of thousands of entries) and the scan happens only when
//! the tier is full, so the simplicity wins over an ordered structure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use glob::Pattern;
use parking_lot::Mutex;
use serde_json::Value;

use super::types::{CacheEntry, TierStats};

pub struct FastTier {
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

impl FastTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_removals: AtomicU64::new(0),
        }
    }

    /// Looks up a key, refreshing `last_accessed` on a hit.
    ///
    /// An entry past its expiry is removed on the spot and reported as a
    /// miss, independent of the background sweep.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if expired {
            entries.remove(key);
            self.expired_removals.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.last_accessed = now;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Inserts a value with the given TTL, evicting the least-recently
    /// accessed entry first when the tier is at capacity.
    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(key) && entries.len() >= self.capacity {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru_key {
                entries.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        entries.insert(key.to_string(), CacheEntry::new(value, now + ttl));
    }

    /// Removes one key. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Removes every key matching the glob pattern; returns the count.
    pub fn remove_matching(&self, pattern: &Pattern) -> usize {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        doomed.len()
    }

    /// Drops every entry whose expiry has passed; returns the count.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        self.expired_removals
            .fetch_add(doomed.len() as u64, Ordering::Relaxed);
        doomed.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.entries
            .lock()
            .values()
            .map(|e| e.size_bytes as u64)
            .sum()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expired_removals(&self) -> u64 {
        self.expired_removals.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len() as u64,
            size_bytes: self.size_bytes(),
        }
    }
}

impl std::fmt::Debug for FastTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastTier")
            .field("capacity", &self.capacity)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_refreshes_last_accessed() {
        let tier = FastTier::new(2);
        tier.insert("a", json!(1), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        tier.insert("b", json!(2), Duration::from_secs(60));

        // "a" is older; touching it makes "b" the LRU victim.
        std::thread::sleep(Duration::from_millis(5));
        assert!(tier.get("a").is_some());

        tier.insert("c", json!(3), Duration::from_secs(60));
        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
        assert_eq!(tier.evictions(), 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let tier = FastTier::new(10);
        tier.insert("k", json!("v"), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(25));

        assert!(tier.get("k").is_none());
        assert_eq!(tier.len(), 0);
        assert_eq!(tier.expired_removals(), 1);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let tier = FastTier::new(1);
        tier.insert("k", json!(1), Duration::from_secs(60));
        tier.insert("k", json!(2), Duration::from_secs(60));

        assert_eq!(tier.get("k"), Some(json!(2)));
        assert_eq!(tier.evictions(), 0);
    }

    #[test]
    fn test_remove_matching() {
        let tier = FastTier::new(10);
        tier.insert("gen:1", json!(1), Duration::from_secs(60));
        tier.insert("gen:2", json!(2), Duration::from_secs(60));
        tier.insert("val:1", json!(3), Duration::from_secs(60));

        let pattern = Pattern::new("gen:*").unwrap();
        assert_eq!(tier.remove_matching(&pattern), 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("val:1").is_some());
    }

    #[test]
    fn test_remove_expired_sweep() {
        let tier = FastTier::new(10);
        tier.insert("short", json!(1), Duration::from_millis(5));
        tier.insert("long", json!(2), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(tier.remove_expired(), 1);
        assert_eq!(tier.len(), 1);
    }
}
