use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::time::Instant;

use crate::metrics::InMemoryMetrics;

use super::config::QueueConfig;
use super::error::ProcessError;
use super::manager::QueueManager;
use super::types::{EnqueueOptions, QueueMessage};
use super::worker::QueueProcessor;

fn fast_config() -> QueueConfig {
    QueueConfig::default()
        .backoff_base(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(10))
        .drain_timeout(Duration::from_secs(2))
}

fn manager() -> QueueManager {
    QueueManager::new(fast_config(), InMemoryMetrics::shared())
}

struct CountingProcessor {
    calls: AtomicU32,
    fail_first: u32,
    attempt_times: Mutex<Vec<Instant>>,
}

impl CountingProcessor {
    fn new(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first,
            attempt_times: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueProcessor for CountingProcessor {
    async fn process(&self, _message: &QueueMessage) -> Result<(), ProcessError> {
        self.attempt_times.lock().push(Instant::now());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(ProcessError::new("scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_priority_ordering_with_stable_ties() {
    let manager = manager();
    let low = manager
        .enqueue("generation", &json!("low"), EnqueueOptions::new().priority(9))
        .unwrap();
    let first_mid = manager
        .enqueue("generation", &json!("mid-1"), EnqueueOptions::new().priority(5))
        .unwrap();
    let second_mid = manager
        .enqueue("generation", &json!("mid-2"), EnqueueOptions::new().priority(5))
        .unwrap();
    let urgent = manager
        .enqueue("generation", &json!("urgent"), EnqueueOptions::new().priority(0))
        .unwrap();

    let batch = manager.dequeue("generation", 10);
    let ids: Vec<_> = batch.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![urgent, first_mid, second_mid, low]);
}

#[test]
fn test_delayed_message_not_ready() {
    let manager = manager();
    manager
        .enqueue(
            "generation",
            &json!("later"),
            EnqueueOptions::new().delay(Duration::from_secs(60)),
        )
        .unwrap();

    assert!(manager.dequeue("generation", 1).is_empty());
    assert_eq!(manager.queue_stats("generation").pending, 1);
}

#[test]
fn test_ttl_expired_message_moves_to_failed_set() {
    let manager = manager();
    manager
        .enqueue(
            "validation",
            &json!("stale"),
            EnqueueOptions::new().ttl(Duration::from_millis(5)),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    assert!(manager.dequeue("validation", 1).is_empty());

    let failed = manager.failed_messages("validation");
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.contains("ttl"));
}

#[test]
fn test_mark_failed_backoff_and_exhaustion() {
    let manager = manager();
    let id = manager
        .enqueue("learning", &json!("flaky"), EnqueueOptions::new().retries(2))
        .unwrap();

    // Attempt 1 fails: retried with a future process_after.
    let msg = manager.dequeue("learning", 1).remove(0);
    assert_eq!(msg.attempts, 1);
    assert!(manager.mark_failed("learning", id, "boom").unwrap());
    assert!(manager.dequeue("learning", 1).is_empty());

    std::thread::sleep(Duration::from_millis(15));
    let msg = manager.dequeue("learning", 1).remove(0);
    assert_eq!(msg.attempts, 2);
    assert_eq!(msg.retries, 1);
    assert!(manager.mark_failed("learning", id, "boom").unwrap());

    std::thread::sleep(Duration::from_millis(30));
    let msg = manager.dequeue("learning", 1).remove(0);
    assert_eq!(msg.retries, 0);
    // Budget exhausted: permanent failure, never retried again.
    assert!(!manager.mark_failed("learning", id, "boom").unwrap());
    std::thread::sleep(Duration::from_millis(50));
    assert!(manager.dequeue("learning", 1).is_empty());
    assert_eq!(manager.failed_messages("learning").len(), 1);
}

#[test]
fn test_purge_idempotent_and_queue_usable_after() {
    let manager = manager();
    manager
        .enqueue("retraining", &json!(1), EnqueueOptions::new())
        .unwrap();
    manager
        .enqueue("retraining", &json!(2), EnqueueOptions::new())
        .unwrap();

    assert_eq!(manager.purge_queue("retraining"), 2);
    assert_eq!(manager.purge_queue("retraining"), 0);

    manager
        .enqueue("retraining", &json!(3), EnqueueOptions::new())
        .unwrap();
    assert_eq!(manager.queue_stats("retraining").pending, 1);
}

#[test]
fn test_lazy_queue_creation() {
    let manager = manager();
    let stats = manager.queue_stats("ad-hoc-channel");
    assert_eq!(stats.name, "ad-hoc-channel");
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_worker_processes_and_completes() {
    let manager = manager();
    let processor = CountingProcessor::new(0);

    for i in 0..5 {
        manager
            .enqueue("generation", &json!({ "n": i }), EnqueueOptions::new())
            .unwrap();
    }
    manager.start_worker("generation", processor.clone()).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    manager.stop_worker("generation", None).await.unwrap();

    assert_eq!(processor.calls(), 5);
    let stats = manager.queue_stats("generation");
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 0);
}

#[tokio::test]
async fn test_worker_retry_with_increasing_backoff_then_failed_set() {
    // Backoff well above the poll interval so attempt gaps are dominated
    // by the backoff schedule, not polling jitter.
    let manager = QueueManager::new(
        QueueConfig::default()
            .backoff_base(Duration::from_millis(60))
            .poll_interval(Duration::from_millis(5))
            .drain_timeout(Duration::from_secs(2)),
        InMemoryMetrics::shared(),
    );
    // Always fails: initial attempt + 2 retries = 3 attempts total.
    let processor = CountingProcessor::new(u32::MAX);

    manager
        .enqueue(
            "validation",
            &json!("doomed"),
            EnqueueOptions::new().retries(2),
        )
        .unwrap();
    manager.start_worker("validation", processor.clone()).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    manager.stop_worker("validation", None).await.unwrap();

    assert_eq!(processor.calls(), 3);

    let times = processor.attempt_times.lock();
    let gap1 = times[1] - times[0];
    let gap2 = times[2] - times[1];
    assert!(gap2 > gap1, "backoff delays must increase: {gap1:?} vs {gap2:?}");

    assert_eq!(manager.failed_messages("validation").len(), 1);
    assert_eq!(manager.queue_stats("validation").failed, 1);
}

#[tokio::test]
async fn test_worker_health_reporting() {
    let manager = manager();
    let processor = CountingProcessor::new(0);
    let id = manager.start_worker("generation", processor).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let health = manager.worker_health("generation");
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].id, id);
    assert!(health[0].healthy);

    manager.stop_worker("generation", Some(id)).await.unwrap();
    assert!(manager.worker_health("generation").is_empty());
}

#[tokio::test]
async fn test_shutdown_rejects_new_work() {
    let manager = manager();
    manager.shutdown().await;

    let err = manager
        .enqueue("generation", &json!(1), EnqueueOptions::new())
        .unwrap_err();
    assert!(matches!(err, super::error::QueueError::ShuttingDown));
}

#[tokio::test]
async fn test_stop_worker_unknown_id() {
    let manager = manager();
    let err = manager
        .stop_worker("generation", Some(uuid::Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        super::error::QueueError::UnknownWorker { .. }
    ));
}
