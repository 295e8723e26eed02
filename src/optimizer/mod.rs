//! Feedback-loop optimizer: caching, coalescing, batching, parallel
//! validation, model-tier routing, and adaptive retry around the two
//! external inference stages.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{Generator, Validator};
pub use config::OptimizerConfig;
pub use engine::FeedbackLoopOptimizer;
pub use error::{CollaboratorError, OptimizerError, OptimizerResult};
pub use retry::{RetryPolicy, with_retry};
pub use store::ResponseStore;
pub use types::{
    DisagreementEvent, GenerationMetadata, GenerationRequest, GenerationResponse, ModelTier,
    NodeVerdict, OptimizationMetrics, Priority, RevisionRequest, ValidationResponse,
    ValidationStrategy,
};

#[cfg(any(test, feature = "mock"))]
pub use client::{MockGenerator, MockValidator};
