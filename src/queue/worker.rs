//! Queue workers: polling consumers with a bounded concurrency budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::QueueConfig;
use super::error::ProcessError;
use super::queue::Queue;
use super::types::QueueMessage;

/// Message consumer attached to a queue via
/// [`crate::queue::QueueManager::start_worker`].
#[async_trait]
pub trait QueueProcessor: Send + Sync + 'static {
    async fn process(&self, message: &QueueMessage) -> Result<(), ProcessError>;
}

/// Liveness report for one worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerHealth {
    pub id: Uuid,
    pub healthy: bool,
    pub since_heartbeat: Duration,
}

/// Handle kept by the manager for a running worker task.
pub(crate) struct WorkerHandle {
    pub(crate) id: Uuid,
    stop: Arc<AtomicBool>,
    heartbeat: Arc<Mutex<Instant>>,
    join: tokio::task::JoinHandle<()>,
    heartbeat_timeout: Duration,
}

impl WorkerHandle {
    /// Spawns the worker loop for `queue` and returns its handle.
    pub(crate) fn spawn(
        queue: Arc<Queue>,
        processor: Arc<dyn QueueProcessor>,
        config: &QueueConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        let stop = Arc::new(AtomicBool::new(false));
        let heartbeat = Arc::new(Mutex::new(Instant::now()));

        let join = tokio::spawn(run_worker(
            id,
            queue,
            processor,
            config.worker_concurrency,
            config.poll_interval,
            Arc::clone(&stop),
            Arc::clone(&heartbeat),
        ));

        Self {
            id,
            stop,
            heartbeat,
            join,
            heartbeat_timeout: config.heartbeat_timeout,
        }
    }

    pub(crate) fn health(&self) -> WorkerHealth {
        let since_heartbeat = self.heartbeat.lock().elapsed();
        WorkerHealth {
            id: self.id,
            healthy: since_heartbeat <= self.heartbeat_timeout,
            since_heartbeat,
        }
    }

    /// Cooperative stop: signal, then wait for in-flight work to finish,
    /// bounded by `drain_timeout`. Abandonment is loud, never silent.
    pub(crate) async fn stop(self, drain_timeout: Duration) {
        self.stop.store(true, Ordering::Release);
        match tokio::time::timeout(drain_timeout, self.join).await {
            Ok(Ok(())) => debug!(worker = %self.id, "worker drained and stopped"),
            Ok(Err(e)) => error!(worker = %self.id, error = %e, "worker task panicked"),
            Err(_) => {
                error!(worker = %self.id, "worker did not drain within timeout, abandoning in-flight work");
            }
        }
    }
}

/// Per-worker loop: poll a batch, process each message concurrently up to
/// the budget, mark completion/failure, refresh the heartbeat.
async fn run_worker(
    id: Uuid,
    queue: Arc<Queue>,
    processor: Arc<dyn QueueProcessor>,
    concurrency: usize,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    heartbeat: Arc<Mutex<Instant>>,
) {
    info!(worker = %id, queue = queue.name(), concurrency, "worker started");
    let semaphore = Arc::new(Semaphore::new(concurrency));

    loop {
        *heartbeat.lock() = Instant::now();

        if stop.load(Ordering::Acquire) {
            break;
        }

        let available = semaphore.available_permits();
        if available == 0 {
            sleep(poll_interval).await;
            continue;
        }

        let batch = queue.dequeue(available);
        if batch.is_empty() {
            sleep(poll_interval).await;
            continue;
        }

        for message in batch {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let queue = Arc::clone(&queue);
            let processor = Arc::clone(&processor);

            tokio::spawn(async move {
                let message_id = message.id;
                let outcome = processor.process(&message).await;
                let result = match outcome {
                    Ok(()) => queue.mark_completed(message_id),
                    Err(e) => queue.mark_failed(message_id, &e.reason).map(|_| ()),
                };
                if let Err(e) = result {
                    warn!(id = %message_id, error = %e, "bookkeeping failed after processing");
                }
                drop(permit);
            });
        }
    }

    // Drain: wait until every in-flight task has returned its permit.
    let _ = semaphore.acquire_many(concurrency as u32).await;
    info!(worker = %id, queue = queue.name(), "worker stopped");
}
