//! External collaborator boundaries: the generator (A1) and validator (B1)
//! inference stages. The optimizer only ever talks to these traits; real
//! implementations bind them to actual model endpoints.

use async_trait::async_trait;

use super::error::CollaboratorError;
use super::types::{
    GenerationRequest, GenerationResponse, ModelTier, ValidationResponse,
};

/// The generation stage. Called only on a cache miss.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        tier: ModelTier,
    ) -> Result<GenerationResponse, CollaboratorError>;
}

/// The validation stage. `target_node_ids = None` means the full node set.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        generation: &GenerationResponse,
        request: &GenerationRequest,
        target_node_ids: Option<&[String]>,
    ) -> Result<ValidationResponse, CollaboratorError>;
}

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockGenerator, MockValidator};

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::optimizer::error::CollaboratorError;
    use crate::optimizer::types::{
        GenerationMetadata, GenerationRequest, GenerationResponse, ModelTier, NodeVerdict,
        ValidationResponse,
    };

    use super::{Generator, Validator};

    /// Scripted generator; counts calls so tests can assert that cache hits
    /// avoid external calls.
    pub struct MockGenerator {
        calls: AtomicU64,
        confidence: Mutex<f64>,
        node_count: usize,
        /// Errors returned before successful responses resume.
        scripted_failures: Mutex<VecDeque<CollaboratorError>>,
        last_tier: Mutex<Option<ModelTier>>,
    }

    impl Default for MockGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGenerator {
        pub fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                confidence: Mutex::new(0.9),
                node_count: 4,
                scripted_failures: Mutex::new(VecDeque::new()),
                last_tier: Mutex::new(None),
            }
        }

        pub fn with_node_count(mut self, count: usize) -> Self {
            self.node_count = count;
            self
        }

        pub fn set_confidence(&self, confidence: f64) {
            *self.confidence.lock() = confidence;
        }

        pub fn push_failure(&self, error: CollaboratorError) {
            self.scripted_failures.lock().push_back(error);
        }

        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_tier(&self) -> Option<ModelTier> {
            *self.last_tier.lock()
        }
    }

    #[async_trait]
    impl Generator for MockGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
            tier: ModelTier,
        ) -> Result<GenerationResponse, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_tier.lock() = Some(tier);

            if let Some(error) = self.scripted_failures.lock().pop_front() {
                return Err(error);
            }

            Ok(GenerationResponse {
                request_id: request.request_id.clone(),
                content: format!("generated:{}", request.context),
                node_ids: (0..self.node_count).map(|i| format!("node-{i}")).collect(),
                metadata: GenerationMetadata {
                    confidence: *self.confidence.lock(),
                    token_usage: 128,
                    cost: 0.002,
                },
            })
        }
    }

    /// Scripted validator; records the node subsets it was asked to check.
    pub struct MockValidator {
        calls: AtomicU64,
        failing_nodes: Mutex<Vec<String>>,
        scripted_failures: Mutex<VecDeque<CollaboratorError>>,
        requested_subsets: Mutex<Vec<Vec<String>>>,
        delay: Mutex<Option<std::time::Duration>>,
    }

    impl Default for MockValidator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockValidator {
        pub fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                failing_nodes: Mutex::new(Vec::new()),
                scripted_failures: Mutex::new(VecDeque::new()),
                requested_subsets: Mutex::new(Vec::new()),
                delay: Mutex::new(None),
            }
        }

        /// Holds each validation for `delay`, so tests can observe requests
        /// that are genuinely in flight at the same time.
        pub fn set_delay(&self, delay: std::time::Duration) {
            *self.delay.lock() = Some(delay);
        }

        /// Nodes the validator will fail from now on.
        pub fn set_failing_nodes(&self, nodes: Vec<String>) {
            *self.failing_nodes.lock() = nodes;
        }

        pub fn push_failure(&self, error: CollaboratorError) {
            self.scripted_failures.lock().push_back(error);
        }

        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        /// Node subsets from each call, in call order.
        pub fn requested_subsets(&self) -> Vec<Vec<String>> {
            self.requested_subsets.lock().clone()
        }
    }

    #[async_trait]
    impl Validator for MockValidator {
        async fn validate(
            &self,
            generation: &GenerationResponse,
            _request: &GenerationRequest,
            target_node_ids: Option<&[String]>,
        ) -> Result<ValidationResponse, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let nodes: Vec<String> = match target_node_ids {
                Some(ids) => ids.to_vec(),
                None => generation.node_ids.clone(),
            };
            self.requested_subsets.lock().push(nodes.clone());

            if let Some(error) = self.scripted_failures.lock().pop_front() {
                return Err(error);
            }

            let failing = self.failing_nodes.lock().clone();
            let verdicts: Vec<NodeVerdict> = nodes
                .iter()
                .map(|node_id| {
                    let passed = !failing.contains(node_id);
                    NodeVerdict {
                        node_id: node_id.clone(),
                        passed,
                        quality_score: if passed { 0.9 } else { 0.3 },
                        ethical_score: 0.95,
                        bias_score: 0.1,
                    }
                })
                .collect();

            let quality_score = if verdicts.is_empty() {
                1.0
            } else {
                verdicts.iter().map(|v| v.quality_score).sum::<f64>() / verdicts.len() as f64
            };

            Ok(ValidationResponse {
                generation_id: generation.request_id.clone(),
                verdicts,
                quality_score,
                ethical_score: 0.95,
                bias_score: 0.1,
            })
        }
    }
}
