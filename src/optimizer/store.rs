//! Optimizer-private response store.
//!
//! A deliberately simpler layer than the tiered cache: when the size cap is
//! exceeded it evicts the oldest-inserted entry first (insertion order, not
//! LRU). It holds per-node verdicts and other optimizer bookkeeping whose
//! lifetime is governed by dynamic TTLs.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

struct StoredEntry {
    value: Value,
    expires_at: Instant,
}

struct StoreInner {
    entries: HashMap<String, StoredEntry>,
    /// Insertion order; front is the eviction victim.
    order: VecDeque<String>,
}

pub struct ResponseStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl ResponseStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.lock();
        let expired = inner
            .entries
            .get(key)
            .is_some_and(|e| Instant::now() > e.expires_at);
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        let value = inner.entries.get(key)?.value.clone();
        serde_json::from_value(value).ok()
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(_) => return,
        };

        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(key) {
            while inner.entries.len() >= self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(key.to_string());
        }
        inner.entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .is_some_and(|e| Instant::now() <= e.expires_at)
    }

    /// Drops expired entries; returns the count removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| now > e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            inner.entries.remove(key);
        }
        inner.order.retain(|k| !doomed.contains(k));
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl std::fmt::Debug for ResponseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStore")
            .field("capacity", &self.capacity)
            .field("entries", &self.len())
            .finish()
    }
}
