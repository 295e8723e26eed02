//! Queue manager: named priority queues with delayed/TTL'd messages, retry
//! with exponential backoff, and a pool of concurrent workers per queue.

pub mod config;
pub mod error;
pub mod manager;
pub mod queue;
pub mod types;
pub mod worker;

#[cfg(test)]
mod tests;

pub use config::{PREDEFINED_CHANNELS, QueueConfig};
pub use error::{ProcessError, QueueError, QueueResult};
pub use manager::{QueueManager, shutdown_signal};
pub use queue::Queue;
pub use types::{EnqueueOptions, FailedMessage, QueueMessage, QueueStats};
pub use worker::{QueueProcessor, WorkerHealth};
