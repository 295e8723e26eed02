//! Deterministic BLAKE3 key derivation for cache and coalescing lookups.
//!
//! Keys are derived from the semantic parts of a request only (context,
//! content type, node subset), so retries and identical concurrent requests
//! land on the same cache slot.

use blake3::Hasher;

/// Computes the cache key for a generation request from its semantic context
/// and content type. Hex-encoded 256-bit BLAKE3.
#[inline]
pub fn generation_key(context: &str, content_type: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(context.as_bytes());
    hasher.update(b"|");
    hasher.update(content_type.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Computes the cache key for a validation request over a generation identity
/// and a (sorted) node subset. An empty subset means "all nodes".
#[inline]
pub fn validation_key(generation_id: &str, node_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = node_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Hasher::new();
    hasher.update(generation_id.as_bytes());
    for node in sorted {
        hasher.update(b"|");
        hasher.update(node.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Truncation is acceptable here: these values index in-process maps and
/// deduplicate in-flight requests. A collision degrades to a spurious cache
/// miss or a shared wait, never to data corruption, and the birthday bound
/// (`P ≈ n² / 2^65`) is negligible at realistic cache sizes.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}
