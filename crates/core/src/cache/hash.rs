//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request identity.
///
/// Callers pass an already-normalized method and origin-relative path.
pub fn compute_request_key(method: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_request_key("GET", "/api/tanks");
        let hash2 = compute_request_key("GET", "/api/tanks");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        assert_ne!(compute_request_key("GET", "/api/tanks"), compute_request_key("HEAD", "/api/tanks"));
    }

    #[test]
    fn test_hash_query_is_significant() {
        assert_ne!(
            compute_request_key("GET", "/api/tanks"),
            compute_request_key("GET", "/api/tanks?zone=north")
        );
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_request_key("GET", "/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
