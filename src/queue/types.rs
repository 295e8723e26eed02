use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// A message owned by a single queue.
///
/// `retries` counts down from `max_retries`; once it hits zero and the
/// message fails again, it moves to the failed set permanently.
/// `process_after` supports delayed delivery and retry backoff. `seq` is a
/// per-queue monotonic counter that keeps priority ordering stable.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: Uuid,
    pub payload: Value,
    /// Lower value = served first.
    pub priority: u8,
    pub retries: u32,
    pub max_retries: u32,
    pub ttl: Option<Duration>,
    pub enqueued_at: Instant,
    pub enqueued_time: DateTime<Utc>,
    pub process_after: Instant,
    /// Number of times the message has been handed to a processor.
    pub attempts: u32,
    pub(crate) seq: u64,
}

impl QueueMessage {
    /// Deserializes the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Returns `true` if the message's TTL has elapsed.
    #[inline]
    pub fn is_ttl_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now > self.enqueued_at + ttl,
            None => false,
        }
    }

    /// Ready = past its `process_after` and not TTL-dead.
    #[inline]
    pub(crate) fn is_ready(&self, now: Instant) -> bool {
        self.process_after <= now && !self.is_ttl_expired(now)
    }
}

/// Per-enqueue options; unset fields fall back to queue defaults.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<u8>,
    pub delay: Option<Duration>,
    pub retries: Option<u32>,
    pub ttl: Option<Duration>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A message that exhausted its retries, died of TTL, or was rejected.
#[derive(Debug, Clone)]
pub struct FailedMessage {
    pub message: QueueMessage,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Derived queue counters; recomputed on demand, never primary state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStats {
    pub name: String,
    pub pending: usize,
    pub processing: usize,
    pub completed: u64,
    pub failed: u64,
    pub avg_wait_ms: f64,
}
