//! Content-addressed entry key generation.
//!
//! Request identity is method + URL; the stored key is a hash of both so
//! keys are fixed-width and safe to index regardless of URL length.

use sha2::{Digest, Sha256};

/// Compute the entry key for a request identity.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
