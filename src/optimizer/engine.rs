//! The feedback-loop optimizer.
//!
//! Sits between the host application and the two inference stages and
//! minimizes redundant external calls through caching, request coalescing,
//! batching, parallel validation, and adaptive retry. Terminal failures
//! always surface to the caller; only transient ones are retried.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::TieredCache;
use crate::hashing;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::queue::{EnqueueOptions, QueueManager};

use super::client::{Generator, Validator};
use super::config::OptimizerConfig;
use super::error::{CollaboratorError, OptimizerError, OptimizerResult};
use super::metrics::MetricsRecorder;
use super::retry::with_retry;
use super::store::ResponseStore;
use super::types::{
    DisagreementEvent, GenerationRequest, GenerationResponse, ModelTier, NodeVerdict,
    OptimizationMetrics, Priority, RevisionRequest, ValidationResponse, ValidationStrategy,
};

type CoalesceResult = Result<ValidationResponse, String>;

pub struct FeedbackLoopOptimizer {
    config: OptimizerConfig,
    generator: Arc<dyn Generator>,
    validator: Arc<dyn Validator>,
    cache: Arc<TieredCache>,
    store: ResponseStore,
    queues: Option<Arc<QueueManager>>,
    recorder: MetricsRecorder,
    metrics: Arc<dyn MetricsSink>,
    in_flight: Mutex<HashMap<String, Vec<oneshot::Sender<CoalesceResult>>>>,
    sweeper_running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl FeedbackLoopOptimizer {
    pub fn new(
        config: OptimizerConfig,
        generator: Arc<dyn Generator>,
        validator: Arc<dyn Validator>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            store: ResponseStore::new(config.store_capacity),
            config,
            generator,
            validator,
            cache,
            queues: None,
            recorder: MetricsRecorder::new(),
            metrics: Arc::new(NoopMetrics),
            in_flight: Mutex::new(HashMap::new()),
            sweeper_running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wires the queue manager used for deferred work (disagreement and
    /// learning events).
    pub fn with_queues(mut self, queues: Arc<QueueManager>) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Current optimizer read-model metrics.
    pub fn metrics_snapshot(&self) -> OptimizationMetrics {
        self.recorder.snapshot()
    }

    /// Serves a generation from cache when possible; otherwise routes to a
    /// model tier, calls the generator under retry, and caches the result
    /// with a dynamic TTL.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn optimize_generation(
        &self,
        request: &GenerationRequest,
    ) -> OptimizerResult<GenerationResponse> {
        let key = format!(
            "gen:{}",
            hashing::generation_key(&request.context, &request.content_type)
        );

        if let Some(cached) = self.cache.get::<GenerationResponse>(&key).await {
            self.recorder.record_cache_lookup(true);
            let saved_ms = self.recorder.snapshot().avg_response_time_ms as u64;
            self.recorder
                .record_savings(cached.metadata.token_usage, saved_ms);
            self.metrics.increment("optimizer.generation.cache_hit", 1);
            debug!("generation cache hit, skipping external call");
            return Ok(cached);
        }
        self.recorder.record_cache_lookup(false);
        self.metrics.increment("optimizer.generation.cache_miss", 1);

        let tier = self.route_tier(request);
        debug!(tier = %tier, "generation tier selected");

        let started = Instant::now();
        let response = with_retry(&self.config.retry, "generation", || {
            self.generator.generate(request, tier)
        })
        .await
        .map_err(|(attempts, source)| {
            error!(
                request_id = %request.request_id,
                content_type = %request.content_type,
                priority = ?request.priority,
                attempts,
                error = %source,
                "generation failed"
            );
            self.metrics.increment("optimizer.generation.failed", 1);
            OptimizerError::GenerationFailed {
                request_id: request.request_id.clone(),
                attempts,
                source,
            }
        })?;

        let elapsed_ms = started.elapsed().as_millis() as f64;
        self.recorder.record_response_time(elapsed_ms);
        self.metrics
            .histogram("optimizer.generation.latency_ms", elapsed_ms);

        let ttl = self.dynamic_ttl(response.metadata.confidence, request.priority);
        self.cache.set(&key, &response, Some(ttl)).await;
        debug!(ttl_secs = ttl.as_secs(), "generation cached with dynamic TTL");

        Ok(response)
    }

    /// Validates a generation (fully or for a node subset), choosing a
    /// strategy and coalescing concurrent identical requests.
    #[instrument(skip(self, generation, request), fields(generation_id = %generation.request_id))]
    pub async fn optimize_validation(
        &self,
        generation: &GenerationResponse,
        request: &GenerationRequest,
        node_ids: Option<Vec<String>>,
    ) -> OptimizerResult<ValidationResponse> {
        let target = node_ids.unwrap_or_else(|| generation.node_ids.clone());
        let key = format!(
            "val:{}",
            hashing::validation_key(&generation.request_id, &target)
        );

        if let Some(cached) = self.cache.get::<ValidationResponse>(&key).await {
            self.recorder.record_cache_lookup(true);
            self.metrics.increment("optimizer.validation.cache_hit", 1);
            return Ok(cached);
        }
        self.recorder.record_cache_lookup(false);

        // Request coalescing: one in-flight validation per key; followers
        // wait on the leader's result instead of issuing duplicate calls.
        let waiter = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    in_flight.insert(key.clone(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            self.metrics.increment("optimizer.validation.coalesced", 1);
            debug!("joined in-flight validation");
            return match rx.await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(reason)) => Err(OptimizerError::ValidationFailed {
                    generation_id: generation.request_id.clone(),
                    attempts: 0,
                    source: CollaboratorError::Upstream { reason },
                }),
                Err(_) => Err(OptimizerError::CoalesceAbandoned { key }),
            };
        }

        let result = self
            .execute_validation(generation, request, &target, &key)
            .await;

        let waiters = self.in_flight.lock().remove(&key).unwrap_or_default();
        for tx in waiters {
            let shared = match &result {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(shared);
        }

        result
    }

    async fn execute_validation(
        &self,
        generation: &GenerationResponse,
        request: &GenerationRequest,
        target: &[String],
        key: &str,
    ) -> OptimizerResult<ValidationResponse> {
        let strategy = self.resolve_strategy(generation, target);
        info!(
            strategy = strategy.name(),
            nodes = target.len(),
            "validation strategy selected"
        );
        self.metrics.increment(
            &format!("optimizer.validation.strategy.{}", strategy.name()),
            1,
        );

        let started = Instant::now();
        let response = match &strategy {
            ValidationStrategy::Standard => {
                self.call_validator(generation, request, target).await?
            }
            ValidationStrategy::Parallel { groups } => {
                self.recorder
                    .record_parallelism(groups.len(), self.config.max_parallel);
                let calls = groups
                    .iter()
                    .map(|group| self.call_validator(generation, request, group));
                let partials = join_all(calls).await;
                let mut responses = Vec::with_capacity(partials.len());
                for partial in partials {
                    responses.push(partial?);
                }
                merge_responses(&generation.request_id, target, responses)
            }
            ValidationStrategy::Batch { groups } => {
                let mut responses = Vec::with_capacity(groups.len());
                for group in groups {
                    responses.push(self.call_validator(generation, request, group).await?);
                }
                merge_responses(&generation.request_id, target, responses)
            }
            ValidationStrategy::Incremental { nodes } => {
                let mut responses = Vec::new();
                if !nodes.is_empty() {
                    responses.push(self.call_validator(generation, request, nodes).await?);
                }
                // Backfill the rest from stored per-node verdicts.
                let fresh: HashSet<&String> = nodes.iter().collect();
                let cached_verdicts: Vec<NodeVerdict> = target
                    .iter()
                    .filter(|node| !fresh.contains(node))
                    .filter_map(|node| {
                        self.store
                            .get::<NodeVerdict>(&verdict_key(&generation.request_id, node))
                    })
                    .collect();
                if !cached_verdicts.is_empty() {
                    let aggregate = aggregate_scores(&cached_verdicts);
                    responses.push(ValidationResponse {
                        generation_id: generation.request_id.clone(),
                        verdicts: cached_verdicts,
                        quality_score: aggregate.0,
                        ethical_score: aggregate.1,
                        bias_score: aggregate.2,
                    });
                }
                merge_responses(&generation.request_id, target, responses)
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as f64;
        self.recorder.record_response_time(elapsed_ms);
        self.metrics
            .histogram("optimizer.validation.latency_ms", elapsed_ms);

        let ttl = self.dynamic_ttl(generation.metadata.confidence, request.priority);
        for verdict in &response.verdicts {
            self.store.insert(
                &verdict_key(&generation.request_id, &verdict.node_id),
                verdict,
                ttl,
            );
        }
        self.cache.set(key, &response, Some(ttl)).await;

        self.report_disagreement(generation, &response);
        Ok(response)
    }

    async fn call_validator(
        &self,
        generation: &GenerationResponse,
        request: &GenerationRequest,
        nodes: &[String],
    ) -> OptimizerResult<ValidationResponse> {
        with_retry(&self.config.retry, "validation", || {
            self.validator.validate(generation, request, Some(nodes))
        })
        .await
        .map_err(|(attempts, source)| {
            error!(
                generation_id = %generation.request_id,
                nodes = nodes.len(),
                attempts,
                error = %source,
                "validation failed"
            );
            self.metrics.increment("optimizer.validation.failed", 1);
            OptimizerError::ValidationFailed {
                generation_id: generation.request_id.clone(),
                attempts,
                source,
            }
        })
    }

    /// Single strategy-resolution point for the closed strategy set.
    fn resolve_strategy(
        &self,
        generation: &GenerationResponse,
        target: &[String],
    ) -> ValidationStrategy {
        let unseen: Vec<String> = target
            .iter()
            .filter(|node| {
                !self
                    .store
                    .contains(&verdict_key(&generation.request_id, node))
            })
            .cloned()
            .collect();

        if unseen.len() < target.len() {
            return ValidationStrategy::Incremental { nodes: unseen };
        }
        if target.len() >= self.config.parallel_threshold {
            return ValidationStrategy::Parallel {
                groups: partition(target, self.config.max_parallel),
            };
        }
        if target.len() >= self.config.batch_threshold {
            return ValidationStrategy::Batch {
                groups: target
                    .chunks(self.config.batch_size)
                    .map(|chunk| chunk.to_vec())
                    .collect(),
            };
        }
        ValidationStrategy::Standard
    }

    /// Executes a batch of revisions in dependency order: Kahn levels first,
    /// similar (same content type) revisions batched within a level, each
    /// batch run concurrently. Results are keyed by request id.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn optimize_revisions(
        &self,
        requests: &[RevisionRequest],
    ) -> OptimizerResult<HashMap<String, GenerationResponse>> {
        let levels = dependency_levels(requests)?;
        let mut results = HashMap::with_capacity(requests.len());

        for level in levels {
            let mut by_type: BTreeMap<&str, Vec<&RevisionRequest>> = BTreeMap::new();
            for revision in level {
                by_type
                    .entry(revision.content_type.as_str())
                    .or_default()
                    .push(revision);
            }

            for batch in by_type.values() {
                let calls = batch.iter().map(|revision| async {
                    let generated = self
                        .optimize_generation(&revision.to_generation_request())
                        .await;
                    (revision.request_id.clone(), generated)
                });
                for (request_id, outcome) in join_all(calls).await {
                    results.insert(request_id, outcome?);
                }
            }
        }

        Ok(results)
    }

    fn route_tier(&self, request: &GenerationRequest) -> ModelTier {
        if request.model_override.is_some() {
            return ModelTier::HighPerformance;
        }
        let complexity = complexity_score(&request.context);
        if request.priority >= Priority::High || complexity >= self.config.complexity_threshold {
            ModelTier::HighPerformance
        } else {
            ModelTier::CostEfficient
        }
    }

    /// `base_ttl * confidence * priority_multiplier`: low confidence or high
    /// priority shortens the cache lifetime.
    fn dynamic_ttl(&self, confidence: f64, priority: Priority) -> Duration {
        let secs = self.config.base_ttl.as_secs_f64()
            * confidence.clamp(0.1, 1.0)
            * priority.ttl_multiplier();
        Duration::from_secs_f64(secs.max(1.0))
    }

    fn report_disagreement(&self, generation: &GenerationResponse, response: &ValidationResponse) {
        let failed_nodes: Vec<String> = response
            .verdicts
            .iter()
            .filter(|v| !v.passed)
            .map(|v| v.node_id.clone())
            .collect();
        if failed_nodes.is_empty()
            || generation.metadata.confidence < self.config.disagreement_confidence
        {
            return;
        }

        self.metrics.increment("optimizer.disagreements", 1);
        let Some(queues) = &self.queues else {
            return;
        };
        let event = DisagreementEvent {
            generation_id: generation.request_id.clone(),
            failed_nodes,
            generator_confidence: generation.metadata.confidence,
            validator_quality: response.quality_score,
        };
        if let Err(e) = queues.enqueue("disagreement", &event, EnqueueOptions::new()) {
            warn!(error = %e, "failed to enqueue disagreement event");
        }
    }

    /// Starts the response store's background expiry sweep.
    pub fn spawn_store_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.sweeper_running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }

        let optimizer = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(optimizer.config.sweep_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if optimizer.shutdown.load(Ordering::Acquire) {
                    break;
                }
                let removed = optimizer.store.remove_expired();
                if removed > 0 {
                    debug!(removed, "response store sweep removed entries");
                }
            }
            optimizer.sweeper_running.store(false, Ordering::Release);
        })
    }

    pub fn stop_store_sweeper(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for FeedbackLoopOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLoopOptimizer")
            .field("store", &self.store)
            .field("queues_wired", &self.queues.is_some())
            .finish()
    }
}

fn verdict_key(generation_id: &str, node_id: &str) -> String {
    format!("verdict:{generation_id}:{node_id}")
}

/// Length- and structure-based complexity estimate in `0.0..=1.0`.
fn complexity_score(context: &str) -> f64 {
    let length_component = (context.len() as f64 / 2000.0).min(1.0);
    let line_component = (context.lines().count() as f64 / 50.0).min(1.0);
    length_component * 0.7 + line_component * 0.3
}

/// Splits `target` into at most `ceiling` contiguous groups of near-equal
/// size, preserving order.
fn partition(target: &[String], ceiling: usize) -> Vec<Vec<String>> {
    let ceiling = ceiling.max(1);
    let group_size = target.len().div_ceil(ceiling);
    target
        .chunks(group_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

fn aggregate_scores(verdicts: &[NodeVerdict]) -> (f64, f64, f64) {
    if verdicts.is_empty() {
        return (1.0, 1.0, 0.0);
    }
    let n = verdicts.len() as f64;
    (
        verdicts.iter().map(|v| v.quality_score).sum::<f64>() / n,
        verdicts.iter().map(|v| v.ethical_score).sum::<f64>() / n,
        verdicts.iter().map(|v| v.bias_score).sum::<f64>() / n,
    )
}

/// Merges partial responses into one verdict per target node (first verdict
/// for a node wins; duplicates across groups are dropped) with recomputed
/// aggregate scores.
fn merge_responses(
    generation_id: &str,
    target: &[String],
    partials: Vec<ValidationResponse>,
) -> ValidationResponse {
    let mut by_node: HashMap<String, NodeVerdict> = HashMap::new();
    for partial in partials {
        for verdict in partial.verdicts {
            by_node.entry(verdict.node_id.clone()).or_insert(verdict);
        }
    }

    let verdicts: Vec<NodeVerdict> = target
        .iter()
        .filter_map(|node| by_node.remove(node))
        .collect();
    let (quality_score, ethical_score, bias_score) = aggregate_scores(&verdicts);

    ValidationResponse {
        generation_id: generation_id.to_string(),
        verdicts,
        quality_score,
        ethical_score,
        bias_score,
    }
}

/// Kahn-style leveling over intra-batch dependencies. Dependencies naming
/// ids outside the batch are ignored.
fn dependency_levels(
    requests: &[RevisionRequest],
) -> Result<Vec<Vec<&RevisionRequest>>, OptimizerError> {
    let ids: HashSet<&str> = requests.iter().map(|r| r.request_id.as_str()).collect();
    let mut remaining: Vec<&RevisionRequest> = requests.iter().collect();
    let mut done: HashSet<String> = HashSet::new();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&RevisionRequest>, Vec<&RevisionRequest>) =
            remaining.iter().partition(|r| {
                r.depends_on
                    .iter()
                    .all(|dep| !ids.contains(dep.as_str()) || done.contains(dep))
            });

        if ready.is_empty() {
            return Err(OptimizerError::DependencyCycle {
                request_id: blocked
                    .first()
                    .map(|r| r.request_id.clone())
                    .unwrap_or_default(),
            });
        }

        for revision in &ready {
            done.insert(revision.request_id.clone());
        }
        levels.push(ready);
        remaining = blocked;
    }

    Ok(levels)
}
