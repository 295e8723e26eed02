use serde::{Deserialize, Serialize};

/// Request priority; drives model-tier routing and dynamic TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Urgent results should be re-validated sooner, so they cache shorter.
    #[inline]
    pub fn ttl_multiplier(&self) -> f64 {
        match self {
            Priority::Low => 1.25,
            Priority::Normal => 1.0,
            Priority::High => 0.75,
            Priority::Urgent => 0.5,
        }
    }
}

/// Inference tier the generation call is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    CostEfficient,
    HighPerformance,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::CostEfficient => "cost_efficient",
            ModelTier::HighPerformance => "high_performance",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generation request as submitted by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: String,
    /// Semantic context; together with `content_type` it determines the
    /// cache key, so two requests with the same context share a slot.
    pub context: String,
    pub content_type: String,
    pub priority: Priority,
    /// Bypasses tier routing when set; passed through to the generator.
    pub model_override: Option<String>,
}

/// Usage/cost metadata reported by the generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Generator self-reported confidence in `0.0..=1.0`.
    pub confidence: f64,
    pub token_usage: u64,
    pub cost: f64,
}

/// Generated content, decomposed into addressable nodes for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub request_id: String,
    pub content: String,
    /// Addressable units of the content, each independently validatable.
    pub node_ids: Vec<String>,
    pub metadata: GenerationMetadata,
}

/// Verdict for one content node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVerdict {
    pub node_id: String,
    pub passed: bool,
    pub quality_score: f64,
    pub ethical_score: f64,
    pub bias_score: f64,
}

/// Validator output: per-node verdicts plus aggregate scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub generation_id: String,
    pub verdicts: Vec<NodeVerdict>,
    pub quality_score: f64,
    pub ethical_score: f64,
    pub bias_score: f64,
}

impl ValidationResponse {
    /// `true` when every verdict passed.
    pub fn all_passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }
}

/// Closed strategy set for validation execution; resolved by a single
/// function, dispatched by match. The set is small and fixed, so a tagged
/// enum beats open-ended trait objects here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// Independent node groups validated concurrently, then merged.
    Parallel { groups: Vec<Vec<String>> },
    /// Related nodes grouped and validated together to amortize call
    /// overhead; groups run sequentially.
    Batch { groups: Vec<Vec<String>> },
    /// Only nodes without a previously stored verdict are validated.
    Incremental { nodes: Vec<String> },
    /// Single call over the full node set.
    Standard,
}

impl ValidationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationStrategy::Parallel { .. } => "parallel",
            ValidationStrategy::Batch { .. } => "batch",
            ValidationStrategy::Incremental { .. } => "incremental",
            ValidationStrategy::Standard => "standard",
        }
    }
}

/// One revision in a dependent batch submitted to
/// [`crate::optimizer::FeedbackLoopOptimizer::optimize_revisions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRequest {
    pub request_id: String,
    pub context: String,
    pub content_type: String,
    pub priority: Priority,
    /// Request ids (within the same batch) that must complete first.
    pub depends_on: Vec<String>,
}

impl RevisionRequest {
    /// The equivalent generation request, sharing the cache keyspace.
    pub fn to_generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            request_id: self.request_id.clone(),
            context: self.context.clone(),
            content_type: self.content_type.clone(),
            priority: self.priority,
            model_override: None,
        }
    }
}

/// Disagreement record pushed onto the `disagreement` queue channel when
/// validator verdicts conflict with a confident generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisagreementEvent {
    pub generation_id: String,
    pub failed_nodes: Vec<String>,
    pub generator_confidence: f64,
    pub validator_quality: f64,
}

/// Cumulative and windowed optimizer metrics (read-model, never persisted).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptimizationMetrics {
    /// Exponentially-weighted running cache hit rate.
    pub cache_hit_rate: f64,
    /// Exponentially-weighted average response time (ms).
    pub avg_response_time_ms: f64,
    /// How much of the parallel ceiling recent validations exploited.
    pub parallel_efficiency: f64,
    pub api_calls_avoided: u64,
    pub tokens_saved: u64,
    pub time_saved_ms: u64,
}
