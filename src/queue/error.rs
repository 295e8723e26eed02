use thiserror::Error;
use uuid::Uuid;

/// Errors returned by queue manager operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Payload could not be serialized for enqueueing.
    #[error("payload serialization failed: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    /// The manager is draining; no new work is accepted.
    #[error("queue manager is shutting down")]
    ShuttingDown,

    /// The referenced message is not in the processing set.
    #[error("message {id} is not being processed on queue '{queue}'")]
    UnknownMessage { queue: String, id: Uuid },

    /// No worker with the given id is attached to the queue.
    #[error("no worker {id} on queue '{queue}'")]
    UnknownWorker { queue: String, id: Uuid },
}

/// Convenience result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Failure reported by a message processor. Always triggers the retry
/// path; whether it recurs past the retry budget decides terminality.
#[derive(Debug, Error)]
#[error("message processing failed: {reason}")]
pub struct ProcessError {
    pub reason: String,
}

impl ProcessError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
