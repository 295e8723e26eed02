//! Remote shared tier boundary.
//!
//! The engine treats the remote tier as an eventually-consistent
//! key/value store addressed through a namespacing key prefix. A concrete
//! implementation binds this trait to a real store (Redis, Memcached, a
//! cloud KV). The crate itself ships only the in-memory mock used by tests
//! and by hosts that run memory-only.

use std::time::Duration;

use async_trait::async_trait;

use super::error::RemoteTierResult;

/// Backend summary returned by [`RemoteTier::info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteTierInfo {
    pub entries: u64,
    pub memory_bytes: u64,
}

/// Key/value contract for the shared remote tier.
///
/// Values are serialized JSON strings; keys arrive already prefixed by the
/// tiered cache. All operations are fallible and the caller is expected to
/// contain failures (spec: a cache outage degrades to a miss).
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Fetches a value. `Ok(None)` is a clean miss.
    async fn get(&self, key: &str) -> RemoteTierResult<Option<String>>;

    /// Stores a value with an absolute TTL.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> RemoteTierResult<()>;

    /// Deletes one key; returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> RemoteTierResult<u64>;

    /// Returns all keys matching a glob pattern.
    async fn scan(&self, pattern: &str) -> RemoteTierResult<Vec<String>>;

    /// Unconditionally removes every key in the namespace.
    async fn flush(&self) -> RemoteTierResult<()>;

    /// Returns backend statistics.
    async fn info(&self) -> RemoteTierResult<RemoteTierInfo>;
}
