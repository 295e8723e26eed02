use thiserror::Error;

/// Errors surfaced by a remote cache tier implementation.
///
/// These never escape [`crate::cache::TieredCache`]'s public `get`/`set`:
/// a failing remote tier degrades to memory-only behavior for that
/// operation. The type exists so tier implementations and tests can speak
/// about failures precisely.
#[derive(Debug, Error)]
pub enum RemoteTierError {
    /// The backing store could not be reached.
    #[error("remote tier connection failed: {reason}")]
    Connection { reason: String },

    /// The store responded but the operation failed.
    #[error("remote tier operation failed: {reason}")]
    Operation { reason: String },

    /// Stored bytes could not be decoded as a cached value.
    #[error("remote tier returned an undecodable value for '{key}'")]
    Decode { key: String },
}

/// Convenience result type for remote tier operations.
pub type RemoteTierResult<T> = Result<T, RemoteTierError>;
