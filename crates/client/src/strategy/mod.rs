//! Per-request serving strategies.
//!
//! Every intercepted request is classified by the [`Router`] and handed to
//! exactly one strategy. Strategies never fail: every path ends in a
//! [`ResponseSnapshot`], synthesized if nothing better is available.

pub mod cache_first;
pub mod network_first;
pub mod offline;
pub mod revalidate;
pub mod router;

pub use cache_first::CacheFirst;
pub use network_first::NetworkFirst;
pub use revalidate::{RefreshCounts, Revalidator};
pub use router::{RequestClass, Router, classify};

use aquasentry_core::{AppConfig, InterceptedRequest, ResponseSnapshot};

/// Which responses may be written to the cache.
///
/// Only successful responses to an explicitly listed read-only method are
/// stored; everything else passes through uncached.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    cacheable_methods: Vec<String>,
}

impl CachePolicy {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { cacheable_methods: methods.into_iter().map(|m| m.as_ref().to_ascii_uppercase()).collect() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.cacheable_methods)
    }

    pub fn allows(&self, method: &str) -> bool {
        self.cacheable_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Whether `response` to `request` should be written through to the cache.
    pub fn should_store(&self, request: &InterceptedRequest, response: &ResponseSnapshot) -> bool {
        response.is_success() && self.allows(&request.method)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(["GET"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_caches_get_only() {
        let policy = CachePolicy::default();
        assert!(policy.allows("GET"));
        assert!(policy.allows("get"));
        assert!(!policy.allows("POST"));
        assert!(!policy.allows("HEAD"));
    }

    #[test]
    fn test_should_store_requires_success() {
        let policy = CachePolicy::default();
        let request = InterceptedRequest::get("/api/tanks");
        assert!(policy.should_store(&request, &ResponseSnapshot::new(200, vec![], "{}")));
        assert!(!policy.should_store(&request, &ResponseSnapshot::new(500, vec![], "{}")));
        assert!(!policy.should_store(&request, &ResponseSnapshot::new(404, vec![], "")));
    }

    #[test]
    fn test_should_store_respects_method() {
        let policy = CachePolicy::from_config(&AppConfig::default());
        let mut request = InterceptedRequest::get("/api/recommendations");
        request.method = "POST".into();
        assert!(!policy.should_store(&request, &ResponseSnapshot::new(200, vec![], "{}")));
    }
}
