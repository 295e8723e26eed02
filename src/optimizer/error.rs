use thiserror::Error;

/// Failure reported by a generation or validation collaborator.
#[derive(Debug, Error, Clone)]
pub enum CollaboratorError {
    /// Upstream throttled the call. Transient.
    #[error("rate limited by upstream")]
    RateLimited,

    /// The call exceeded its deadline. Transient.
    #[error("upstream call timed out")]
    Timeout,

    /// The request itself was malformed. Terminal.
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    /// The collaborator rejected the content. Terminal.
    #[error("rejected by collaborator: {reason}")]
    Rejected { reason: String },

    /// Any other upstream failure. Terminal.
    #[error("upstream failure: {reason}")]
    Upstream { reason: String },
}

impl CollaboratorError {
    /// Only rate-limit and timeout errors are worth retrying.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::RateLimited | CollaboratorError::Timeout)
    }
}

/// Errors surfaced by the optimizer's public operations.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Generation failed terminally or exhausted its retry budget.
    #[error("generation for request '{request_id}' failed after {attempts} attempt(s): {source}")]
    GenerationFailed {
        request_id: String,
        attempts: u32,
        #[source]
        source: CollaboratorError,
    },

    /// Validation failed terminally or exhausted its retry budget.
    #[error("validation for generation '{generation_id}' failed after {attempts} attempt(s): {source}")]
    ValidationFailed {
        generation_id: String,
        attempts: u32,
        #[source]
        source: CollaboratorError,
    },

    /// A coalesced caller's in-flight leader dropped without answering.
    #[error("coalesced validation for '{key}' was abandoned by its leader")]
    CoalesceAbandoned { key: String },

    /// The revision batch contains a dependency cycle.
    #[error("revision batch has a dependency cycle involving '{request_id}'")]
    DependencyCycle { request_id: String },
}

/// Convenience result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;
