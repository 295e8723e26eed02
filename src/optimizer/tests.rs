use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheConfig, TieredCache};
use crate::metrics::InMemoryMetrics;
use crate::queue::{QueueConfig, QueueManager};

use super::client::{MockGenerator, MockValidator};
use super::config::OptimizerConfig;
use super::engine::FeedbackLoopOptimizer;
use super::error::{CollaboratorError, OptimizerError};
use super::retry::RetryPolicy;
use super::types::{GenerationRequest, ModelTier, Priority, RevisionRequest};

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(2),
        max_delay: Duration::from_millis(20),
        jitter_ms: 0,
    }
}

fn fresh_cache() -> Arc<TieredCache> {
    Arc::new(TieredCache::memory_only(CacheConfig::default()))
}

struct Harness {
    optimizer: FeedbackLoopOptimizer,
    generator: Arc<MockGenerator>,
    validator: Arc<MockValidator>,
}

fn harness(config: OptimizerConfig) -> Harness {
    harness_with(config, MockGenerator::new())
}

fn harness_with(config: OptimizerConfig, generator: MockGenerator) -> Harness {
    let generator = Arc::new(generator);
    let validator = Arc::new(MockValidator::new());
    let optimizer = FeedbackLoopOptimizer::new(
        config,
        Arc::clone(&generator) as Arc<dyn super::client::Generator>,
        Arc::clone(&validator) as Arc<dyn super::client::Validator>,
        fresh_cache(),
    );
    Harness {
        optimizer,
        generator,
        validator,
    }
}

fn request(id: &str, context: &str, priority: Priority) -> GenerationRequest {
    GenerationRequest {
        request_id: id.to_string(),
        context: context.to_string(),
        content_type: "article".to_string(),
        priority,
        model_override: None,
    }
}

#[tokio::test]
async fn test_generation_cache_hit_avoids_external_call() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));

    let first = h
        .optimizer
        .optimize_generation(&request("r1", "same context", Priority::Normal))
        .await
        .unwrap();
    // Different request id, same context and content type: same cache slot.
    let second = h
        .optimizer
        .optimize_generation(&request("r2", "same context", Priority::Normal))
        .await
        .unwrap();

    assert_eq!(h.generator.calls(), 1);
    assert_eq!(first.content, second.content);
    assert!(h.optimizer.metrics_snapshot().api_calls_avoided >= 1);
}

#[tokio::test]
async fn test_urgent_priority_routes_to_high_performance_tier() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));

    h.optimizer
        .optimize_generation(&request("r1", "short", Priority::Urgent))
        .await
        .unwrap();

    assert_eq!(h.generator.last_tier(), Some(ModelTier::HighPerformance));
}

#[tokio::test]
async fn test_simple_low_priority_routes_to_cost_efficient_tier() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));

    h.optimizer
        .optimize_generation(&request("r1", "short", Priority::Low))
        .await
        .unwrap();

    assert_eq!(h.generator.last_tier(), Some(ModelTier::CostEfficient));
}

#[tokio::test]
async fn test_complex_context_routes_to_high_performance_tier() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let long_context = "a dense analytical paragraph. ".repeat(200);

    h.optimizer
        .optimize_generation(&request("r1", &long_context, Priority::Low))
        .await
        .unwrap();

    assert_eq!(h.generator.last_tier(), Some(ModelTier::HighPerformance));
}

#[tokio::test]
async fn test_model_override_forces_high_performance_tier() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let mut req = request("r1", "short", Priority::Low);
    req.model_override = Some("flagship".to_string());

    h.optimizer.optimize_generation(&req).await.unwrap();

    assert_eq!(h.generator.last_tier(), Some(ModelTier::HighPerformance));
}

#[tokio::test]
async fn test_transient_generation_failure_retries_to_success() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    h.generator.push_failure(CollaboratorError::Timeout);

    let response = h
        .optimizer
        .optimize_generation(&request("r1", "ctx", Priority::Normal))
        .await
        .unwrap();

    assert_eq!(response.request_id, "r1");
    assert_eq!(h.generator.calls(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_surfaces_generation_failed() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    for _ in 0..3 {
        h.generator.push_failure(CollaboratorError::RateLimited);
    }

    let err = h
        .optimizer
        .optimize_generation(&request("r1", "ctx", Priority::Normal))
        .await
        .unwrap_err();

    match err {
        OptimizerError::GenerationFailed {
            request_id,
            attempts,
            ..
        } => {
            assert_eq!(request_id, "r1");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.generator.calls(), 3);
}

#[tokio::test]
async fn test_terminal_generation_failure_does_not_retry() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    h.generator.push_failure(CollaboratorError::Rejected {
        reason: "policy".to_string(),
    });

    let err = h
        .optimizer
        .optimize_generation(&request("r1", "ctx", Priority::Normal))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::GenerationFailed { attempts: 1, .. }
    ));
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn test_small_node_set_validates_in_one_standard_call() {
    let h = harness_with(
        OptimizerConfig::default().retry(quick_retry()),
        MockGenerator::new().with_node_count(2),
    );
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    let validation = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    assert_eq!(h.validator.calls(), 1);
    assert_eq!(validation.verdicts.len(), 2);
    assert!(validation.all_passed());
}

#[tokio::test]
async fn test_large_node_set_validates_in_parallel_groups() {
    let config = OptimizerConfig::default()
        .retry(quick_retry())
        .parallel_threshold(6)
        .max_parallel(2);
    let h = harness_with(config, MockGenerator::new().with_node_count(10));
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    let validation = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    // 10 nodes across 2 groups of 5.
    let subsets = h.validator.requested_subsets();
    assert_eq!(subsets.len(), 2);
    assert_eq!(subsets[0].len(), 5);
    assert_eq!(subsets[1].len(), 5);

    // Merged result covers every node exactly once.
    assert_eq!(validation.verdicts.len(), 10);
    let mut seen: Vec<&str> = validation
        .verdicts
        .iter()
        .map(|v| v.node_id.as_str())
        .collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn test_mid_size_node_set_validates_in_batches() {
    let config = OptimizerConfig::default()
        .retry(quick_retry())
        .parallel_threshold(100)
        .batch_threshold(3)
        .batch_size(2);
    let h = harness_with(config, MockGenerator::new().with_node_count(4));
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    let validation = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    let subsets = h.validator.requested_subsets();
    assert_eq!(subsets.len(), 2);
    assert!(subsets.iter().all(|s| s.len() == 2));
    assert_eq!(validation.verdicts.len(), 4);
}

#[tokio::test]
async fn test_incremental_validation_skips_stored_verdicts() {
    let h = harness_with(
        OptimizerConfig::default().retry(quick_retry()),
        MockGenerator::new().with_node_count(4),
    );
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    // First pass covers only two nodes.
    let subset = vec!["node-0".to_string(), "node-1".to_string()];
    h.optimizer
        .optimize_validation(&generation, &req, Some(subset))
        .await
        .unwrap();

    // Full pass now only needs the remaining two.
    let full = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    let subsets = h.validator.requested_subsets();
    assert_eq!(subsets.len(), 2);
    assert_eq!(subsets[1], vec!["node-2".to_string(), "node-3".to_string()]);
    assert_eq!(full.verdicts.len(), 4);
}

#[tokio::test]
async fn test_repeated_validation_served_without_second_call() {
    let h = harness_with(
        OptimizerConfig::default().retry(quick_retry()),
        MockGenerator::new().with_node_count(2),
    );
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    let first = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();
    let second = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    assert_eq!(h.validator.calls(), 1);
    assert_eq!(first.verdicts.len(), second.verdicts.len());
}

#[tokio::test]
async fn test_concurrent_identical_validations_coalesce_into_one_call() {
    let h = harness_with(
        OptimizerConfig::default().retry(quick_retry()),
        MockGenerator::new().with_node_count(2),
    );
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    // Keep the leader in flight long enough for the follower to join it.
    h.validator.set_delay(Duration::from_millis(50));

    let (first, second) = tokio::join!(
        h.optimizer.optimize_validation(&generation, &req, None),
        h.optimizer.optimize_validation(&generation, &req, None),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(h.validator.calls(), 1);
    assert_eq!(first.generation_id, second.generation_id);
    assert_eq!(first.verdicts.len(), 2);
    assert_eq!(second.verdicts.len(), 2);
}

#[tokio::test]
async fn test_validation_failure_surfaces_after_retries() {
    let h = harness_with(
        OptimizerConfig::default().retry(quick_retry()),
        MockGenerator::new().with_node_count(2),
    );
    let req = request("r1", "ctx", Priority::Normal);
    let generation = h.optimizer.optimize_generation(&req).await.unwrap();

    for _ in 0..3 {
        h.validator.push_failure(CollaboratorError::Timeout);
    }

    let err = h
        .optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::ValidationFailed { attempts: 3, .. }
    ));
}

#[tokio::test]
async fn test_disagreement_enqueued_for_confident_generation() {
    let generator = MockGenerator::new().with_node_count(2);
    generator.set_confidence(0.9);

    let queues = Arc::new(QueueManager::new(
        QueueConfig::default(),
        InMemoryMetrics::shared(),
    ));
    let generator = Arc::new(generator);
    let validator = Arc::new(MockValidator::new());
    validator.set_failing_nodes(vec!["node-1".to_string()]);

    let optimizer = FeedbackLoopOptimizer::new(
        OptimizerConfig::default().retry(quick_retry()),
        Arc::clone(&generator) as Arc<dyn super::client::Generator>,
        Arc::clone(&validator) as Arc<dyn super::client::Validator>,
        fresh_cache(),
    )
    .with_queues(Arc::clone(&queues));

    let req = request("r1", "ctx", Priority::Normal);
    let generation = optimizer.optimize_generation(&req).await.unwrap();
    let validation = optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    assert!(!validation.all_passed());
    assert_eq!(queues.queue_stats("disagreement").pending, 1);
}

#[tokio::test]
async fn test_no_disagreement_for_low_confidence_generation() {
    let generator = MockGenerator::new().with_node_count(2);
    generator.set_confidence(0.4);

    let queues = Arc::new(QueueManager::new(
        QueueConfig::default(),
        InMemoryMetrics::shared(),
    ));
    let generator = Arc::new(generator);
    let validator = Arc::new(MockValidator::new());
    validator.set_failing_nodes(vec!["node-0".to_string()]);

    let optimizer = FeedbackLoopOptimizer::new(
        OptimizerConfig::default().retry(quick_retry()),
        Arc::clone(&generator) as Arc<dyn super::client::Generator>,
        Arc::clone(&validator) as Arc<dyn super::client::Validator>,
        fresh_cache(),
    )
    .with_queues(Arc::clone(&queues));

    let req = request("r1", "ctx", Priority::Normal);
    let generation = optimizer.optimize_generation(&req).await.unwrap();
    optimizer
        .optimize_validation(&generation, &req, None)
        .await
        .unwrap();

    assert_eq!(queues.queue_stats("disagreement").pending, 0);
}

fn revision(id: &str, context: &str, deps: &[&str]) -> RevisionRequest {
    RevisionRequest {
        request_id: id.to_string(),
        context: context.to_string(),
        content_type: "revision".to_string(),
        priority: Priority::Normal,
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_revision_batch_respects_dependencies() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let batch = vec![
        revision("c", "ctx-c", &["a", "b"]),
        revision("a", "ctx-a", &[]),
        revision("b", "ctx-b", &["a"]),
    ];

    let results = h.optimizer.optimize_revisions(&batch).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.contains_key("a"));
    assert!(results.contains_key("b"));
    assert!(results.contains_key("c"));
    assert_eq!(h.generator.calls(), 3);
}

#[tokio::test]
async fn test_revision_cycle_rejected() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let batch = vec![revision("a", "ctx-a", &["b"]), revision("b", "ctx-b", &["a"])];

    let err = h.optimizer.optimize_revisions(&batch).await.unwrap_err();
    assert!(matches!(err, OptimizerError::DependencyCycle { .. }));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_revision_contexts_share_cache() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let batch = vec![
        revision("a", "shared context", &[]),
        revision("b", "shared context", &["a"]),
    ];

    let results = h.optimizer.optimize_revisions(&batch).await.unwrap();

    // Second revision hits the cache the first one populated.
    assert_eq!(results.len(), 2);
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn test_metrics_snapshot_tracks_hits_and_savings() {
    let h = harness(OptimizerConfig::default().retry(quick_retry()));
    let req = request("r1", "ctx", Priority::Normal);

    h.optimizer.optimize_generation(&req).await.unwrap();
    h.optimizer.optimize_generation(&req).await.unwrap();

    let snapshot = h.optimizer.metrics_snapshot();
    assert!(snapshot.cache_hit_rate > 0.0);
    assert_eq!(snapshot.api_calls_avoided, 1);
    assert_eq!(snapshot.tokens_saved, 128);
}

#[tokio::test]
async fn test_store_sweeper_starts_once() {
    let h = harness(
        OptimizerConfig::default()
            .retry(quick_retry())
            .sweep_interval(Duration::from_millis(10)),
    );
    let optimizer = Arc::new(h.optimizer);

    let first = optimizer.spawn_store_sweeper();
    let second = optimizer.spawn_store_sweeper();
    second.await.unwrap();

    optimizer.stop_store_sweeper();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(first.is_finished());
}
