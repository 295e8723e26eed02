//! In-memory mock of the remote tier (tests and memory-only hosts).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use parking_lot::Mutex;

use super::error::{RemoteTierError, RemoteTierResult};
use super::remote::{RemoteTier, RemoteTierInfo};

#[derive(Default)]
pub struct MockRemoteTier {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    failing: AtomicBool,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
}

impl MockRemoteTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the mock into (or out of) connection-failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check_up(&self) -> RemoteTierResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteTierError::Connection {
                reason: "mock remote tier is offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTier for MockRemoteTier {
    async fn get(&self, key: &str) -> RemoteTierResult<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;

        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires_at)) if Instant::now() > *expires_at => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> RemoteTierResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;

        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> RemoteTierResult<u64> {
        self.check_up()?;
        Ok(self.entries.lock().remove(key).map_or(0, |_| 1))
    }

    async fn scan(&self, pattern: &str) -> RemoteTierResult<Vec<String>> {
        self.check_up()?;
        let pattern = Pattern::new(pattern).map_err(|e| RemoteTierError::Operation {
            reason: format!("invalid scan pattern: {e}"),
        })?;
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }

    async fn flush(&self) -> RemoteTierResult<()> {
        self.check_up()?;
        self.entries.lock().clear();
        Ok(())
    }

    async fn info(&self) -> RemoteTierResult<RemoteTierInfo> {
        self.check_up()?;
        let entries = self.entries.lock();
        let memory_bytes = entries
            .iter()
            .map(|(k, (v, _))| (k.len() + v.len()) as u64)
            .sum();
        Ok(RemoteTierInfo {
            entries: entries.len() as u64,
            memory_bytes,
        })
    }
}

impl std::fmt::Debug for MockRemoteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRemoteTier")
            .field("entries", &self.len())
            .field("failing", &self.failing.load(Ordering::SeqCst))
            .finish()
    }
}
