//! Cache key generation for request identities.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity.
///
/// Method and URL are separated so `GET` + `x` and `GE` + `Tx` never collide.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
