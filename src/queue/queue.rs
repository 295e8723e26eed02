//! A single named queue: priority-ordered pending list, in-flight set, and
//! bounded completed/failed histories.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::QueueConfig;
use super::error::{QueueError, QueueResult};
use super::types::{EnqueueOptions, FailedMessage, QueueMessage, QueueStats};

struct QueueInner {
    /// Kept sorted by `(priority, seq)`; ties resolve in enqueue order.
    pending: Vec<QueueMessage>,
    processing: HashMap<Uuid, QueueMessage>,
    completed: VecDeque<Uuid>,
    failed: VecDeque<FailedMessage>,
    completed_count: u64,
    failed_count: u64,
}

pub struct Queue {
    name: String,
    config: QueueConfig,
    inner: Mutex<QueueInner>,
    seq: AtomicU64,
    wait_total_ms: AtomicU64,
    wait_samples: AtomicU64,
}

impl Queue {
    pub(crate) fn new(name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(QueueInner {
                pending: Vec::new(),
                processing: HashMap::new(),
                completed: VecDeque::new(),
                failed: VecDeque::new(),
                completed_count: 0,
                failed_count: 0,
            }),
            seq: AtomicU64::new(0),
            wait_total_ms: AtomicU64::new(0),
            wait_samples: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts a message into priority order and returns its id.
    pub fn enqueue(&self, payload: Value, options: EnqueueOptions) -> Uuid {
        let now = Instant::now();
        let message = QueueMessage {
            id: Uuid::new_v4(),
            payload,
            priority: options.priority.unwrap_or(self.config.default_priority),
            retries: options.retries.unwrap_or(self.config.default_retries),
            max_retries: options.retries.unwrap_or(self.config.default_retries),
            ttl: options.ttl,
            enqueued_at: now,
            enqueued_time: Utc::now(),
            process_after: now + options.delay.unwrap_or(Duration::ZERO),
            attempts: 0,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let id = message.id;

        let mut inner = self.inner.lock();
        Self::insert_sorted(&mut inner.pending, message);
        debug!(queue = %self.name, %id, "message enqueued");
        id
    }

    fn insert_sorted(pending: &mut Vec<QueueMessage>, message: QueueMessage) {
        let pos = pending
            .partition_point(|m| (m.priority, m.seq) <= (message.priority, message.seq));
        pending.insert(pos, message);
    }

    /// Pops up to `count` ready messages in priority order and moves them
    /// into the processing set. TTL-dead messages encountered along the way
    /// are discarded into the failed set instead of being returned.
    pub fn dequeue(&self, count: usize) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let mut taken = Vec::new();
        let mut index = 0;

        while index < inner.pending.len() && taken.len() < count {
            if inner.pending[index].is_ttl_expired(now) {
                let dead = inner.pending.remove(index);
                warn!(queue = %self.name, id = %dead.id, "message TTL expired before dequeue");
                Self::push_failed(
                    &mut inner,
                    self.config.history_limit,
                    dead,
                    "ttl expired before processing",
                );
                continue;
            }
            if inner.pending[index].is_ready(now) {
                let mut message = inner.pending.remove(index);
                message.attempts += 1;

                let waited = now.saturating_duration_since(message.enqueued_at);
                self.wait_total_ms
                    .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
                self.wait_samples.fetch_add(1, Ordering::Relaxed);

                inner.processing.insert(message.id, message.clone());
                taken.push(message);
            } else {
                index += 1;
            }
        }

        taken
    }

    /// Marks an in-flight message as done.
    pub fn mark_completed(&self, id: Uuid) -> QueueResult<()> {
        let mut inner = self.inner.lock();
        if inner.processing.remove(&id).is_none() {
            return Err(QueueError::UnknownMessage {
                queue: self.name.clone(),
                id,
            });
        }

        inner.completed.push_back(id);
        if inner.completed.len() > self.config.history_limit {
            inner.completed.pop_front();
        }
        inner.completed_count += 1;
        Ok(())
    }

    /// Marks an in-flight message as failed: either re-enqueues it with a
    /// decremented retry budget and an exponentially backed-off
    /// `process_after`, or moves it to the failed set permanently.
    ///
    /// Returns `true` when the message will be retried.
    pub fn mark_failed(&self, id: Uuid, reason: &str) -> QueueResult<bool> {
        let mut inner = self.inner.lock();
        let mut message = match inner.processing.remove(&id) {
            Some(message) => message,
            None => {
                return Err(QueueError::UnknownMessage {
                    queue: self.name.clone(),
                    id,
                });
            }
        };

        if message.retries == 0 {
            warn!(queue = %self.name, %id, reason, "retry budget exhausted, message failed permanently");
            Self::push_failed(&mut inner, self.config.history_limit, message, reason);
            return Ok(false);
        }

        message.retries -= 1;
        let backoff = self.backoff_for_attempt(message.attempts);
        message.process_after = Instant::now() + backoff;
        debug!(
            queue = %self.name,
            %id,
            retries_left = message.retries,
            backoff_ms = backoff.as_millis() as u64,
            "message scheduled for retry"
        );
        Self::insert_sorted(&mut inner.pending, message);
        Ok(true)
    }

    /// `base * 2^(attempt - 1)`, capped to keep the shift sane.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        self.config.backoff_base.saturating_mul(1u32 << exponent)
    }

    fn push_failed(
        inner: &mut QueueInner,
        history_limit: usize,
        message: QueueMessage,
        reason: &str,
    ) {
        inner.failed.push_back(FailedMessage {
            message,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        if inner.failed.len() > history_limit {
            inner.failed.pop_front();
        }
        inner.failed_count += 1;
    }

    /// Clears all pending/processing/completed/failed state; returns the
    /// number of messages removed. Idempotent.
    pub fn purge(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.pending.len() + inner.processing.len() + inner.failed.len();
        inner.pending.clear();
        inner.processing.clear();
        inner.completed.clear();
        inner.failed.clear();
        removed
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        let samples = self.wait_samples.load(Ordering::Relaxed);
        let avg_wait_ms = if samples == 0 {
            0.0
        } else {
            self.wait_total_ms.load(Ordering::Relaxed) as f64 / samples as f64
        };

        QueueStats {
            name: self.name.clone(),
            pending: inner.pending.len(),
            processing: inner.processing.len(),
            completed: inner.completed_count,
            failed: inner.failed_count,
            avg_wait_ms,
        }
    }

    /// Snapshot of the failed set, newest last.
    pub fn failed_messages(&self) -> Vec<FailedMessage> {
        self.inner.lock().failed.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("pending", &inner.pending.len())
            .field("processing", &inner.processing.len())
            .finish()
    }
}
