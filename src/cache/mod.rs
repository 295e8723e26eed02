//! Two-tier cache strategy: fast in-process tier + shared remote tier.

pub mod config;
pub mod error;
pub mod fast;
pub mod remote;
pub mod tiered;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use config::CacheConfig;
pub use error::{RemoteTierError, RemoteTierResult};
pub use fast::FastTier;
pub use remote::{RemoteTier, RemoteTierInfo};
pub use tiered::TieredCache;
pub use types::{CacheEntry, CacheStats, TierStats};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRemoteTier;
