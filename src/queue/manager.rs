//! Named priority queues with workers, retry/backoff, and graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::signal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::metrics::MetricsSink;

use super::config::{PREDEFINED_CHANNELS, QueueConfig};
use super::error::{QueueError, QueueResult};
use super::queue::Queue;
use super::types::{EnqueueOptions, FailedMessage, QueueMessage, QueueStats};
use super::worker::{QueueProcessor, WorkerHandle, WorkerHealth};

pub struct QueueManager {
    config: QueueConfig,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
    workers: Mutex<HashMap<String, Vec<WorkerHandle>>>,
    metrics: Arc<dyn MetricsSink>,
    shutting_down: AtomicBool,
}

impl QueueManager {
    /// Creates a manager with the predefined channels pre-created.
    pub fn new(config: QueueConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        let mut queues = HashMap::new();
        for name in PREDEFINED_CHANNELS {
            queues.insert(name.to_string(), Arc::new(Queue::new(name, config.clone())));
        }

        Self {
            config,
            queues: RwLock::new(queues),
            workers: Mutex::new(HashMap::new()),
            metrics,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Returns the queue, creating it lazily on first reference.
    fn queue(&self, name: &str) -> Arc<Queue> {
        if let Some(queue) = self.queues.read().get(name) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write();
        Arc::clone(
            queues
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Queue::new(name, self.config.clone()))),
        )
    }

    /// Serializes and enqueues a payload; returns the message id.
    #[instrument(skip(self, payload, options), fields(queue = queue_name))]
    pub fn enqueue<T: Serialize>(
        &self,
        queue_name: &str,
        payload: &T,
        options: EnqueueOptions,
    ) -> QueueResult<Uuid> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(QueueError::ShuttingDown);
        }

        let payload =
            serde_json::to_value(payload).map_err(|source| QueueError::SerializeFailed { source })?;
        let queue = self.queue(queue_name);
        let id = queue.enqueue(payload, options);

        self.metrics.increment("queue.enqueued", 1);
        self.metrics
            .gauge(&format!("queue.{queue_name}.depth"), queue.len() as f64);
        Ok(id)
    }

    /// Pops up to `count` ready messages. TTL-dead messages land in the
    /// failed set instead of being returned.
    pub fn dequeue(&self, queue_name: &str, count: usize) -> Vec<QueueMessage> {
        let queue = self.queue(queue_name);
        let batch = queue.dequeue(count);
        if !batch.is_empty() {
            self.metrics.increment("queue.dequeued", batch.len() as u64);
        }
        batch
    }

    pub fn mark_completed(&self, queue_name: &str, id: Uuid) -> QueueResult<()> {
        self.queue(queue_name).mark_completed(id)?;
        self.metrics.increment("queue.completed", 1);
        Ok(())
    }

    /// Returns `true` when the message was re-enqueued for retry.
    pub fn mark_failed(&self, queue_name: &str, id: Uuid, reason: &str) -> QueueResult<bool> {
        let retried = self.queue(queue_name).mark_failed(id, reason)?;
        if retried {
            self.metrics.increment("queue.retried", 1);
        } else {
            self.metrics.increment("queue.failed", 1);
        }
        Ok(retried)
    }

    pub fn queue_stats(&self, queue_name: &str) -> QueueStats {
        self.queue(queue_name).stats()
    }

    /// Stats for every known queue.
    pub fn all_stats(&self) -> Vec<QueueStats> {
        self.queues.read().values().map(|q| q.stats()).collect()
    }

    pub fn failed_messages(&self, queue_name: &str) -> Vec<FailedMessage> {
        self.queue(queue_name).failed_messages()
    }

    /// Clears a queue entirely; returns the number of messages removed.
    pub fn purge_queue(&self, queue_name: &str) -> usize {
        let removed = self.queue(queue_name).purge();
        info!(queue = queue_name, removed, "queue purged");
        removed
    }

    /// Attaches a worker to a queue; returns the worker id. Multiple
    /// workers may attach to one queue for horizontal fan-out.
    pub fn start_worker(
        &self,
        queue_name: &str,
        processor: Arc<dyn QueueProcessor>,
    ) -> QueueResult<Uuid> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(QueueError::ShuttingDown);
        }

        let queue = self.queue(queue_name);
        let handle = WorkerHandle::spawn(queue, processor, &self.config);
        let id = handle.id;
        self.workers
            .lock()
            .entry(queue_name.to_string())
            .or_default()
            .push(handle);
        Ok(id)
    }

    /// Stops one worker (by id) or every worker on the queue (id = `None`),
    /// waiting for in-flight processing to drain.
    pub async fn stop_worker(&self, queue_name: &str, worker_id: Option<Uuid>) -> QueueResult<()> {
        let handles = {
            let mut workers = self.workers.lock();
            match worker_id {
                Some(id) => {
                    let list = workers.get_mut(queue_name);
                    let pos = list
                        .as_ref()
                        .and_then(|l| l.iter().position(|h| h.id == id));
                    match (list, pos) {
                        (Some(list), Some(pos)) => vec![list.remove(pos)],
                        _ => {
                            return Err(QueueError::UnknownWorker {
                                queue: queue_name.to_string(),
                                id,
                            });
                        }
                    }
                }
                None => workers.remove(queue_name).unwrap_or_default(),
            }
        };

        for handle in handles {
            handle.stop(self.config.drain_timeout).await;
        }
        Ok(())
    }

    /// Liveness of every worker attached to a queue. Unhealthy workers are
    /// surfaced, never auto-restarted; that is an operator decision.
    pub fn worker_health(&self, queue_name: &str) -> Vec<WorkerHealth> {
        self.workers
            .lock()
            .get(queue_name)
            .map(|list| list.iter().map(|h| h.health()).collect())
            .unwrap_or_default()
    }

    /// Stops accepting work, then drains and stops every worker.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("queue manager shutting down, draining workers");

        let all: Vec<(String, Vec<WorkerHandle>)> = self.workers.lock().drain().collect();
        for (queue_name, handles) in all {
            for handle in handles {
                handle.stop(self.config.drain_timeout).await;
            }
            info!(queue = queue_name, "workers drained");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Blocks until a termination signal, then runs [`QueueManager::shutdown`].
    /// Intended to be spawned by the host process at startup.
    pub async fn run_until_signal(self: Arc<Self>) {
        shutdown_signal().await;
        self.shutdown().await;
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("queues", &self.queues.read().len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
