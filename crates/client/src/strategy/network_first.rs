//! Network-first strategy for dynamic (API) requests.

use super::CachePolicy;
use super::offline::offline_api_response;
use crate::fetch::Fetcher;
use aquasentry_core::{CacheStorage, InterceptedRequest, ResponseSnapshot};
use std::sync::Arc;

/// Try the network, fall back to the cache, then to a synthesized JSON error.
///
/// Upstream answers are returned as-is whatever their status; only
/// successful responses to cacheable methods are written through. A failed
/// network leg never touches the stored entry.
#[derive(Clone)]
pub struct NetworkFirst {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStorage>,
    policy: CachePolicy,
}

impl NetworkFirst {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>, policy: CachePolicy) -> Self {
        Self { fetcher, cache, policy }
    }

    pub async fn handle(&self, store: &str, request: &InterceptedRequest) -> ResponseSnapshot {
        let identity = request.identity();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if self.policy.should_store(request, &response)
                    && let Err(e) = self.cache.put(store, &identity, &response).await
                {
                    tracing::warn!(%identity, error = %e, "write-through to cache failed");
                }
                response
            }
            Err(err) => {
                tracing::debug!(%identity, error = %err, "network failed, trying cache");
                match self.cache.match_entry(store, &identity).await {
                    Ok(Some(cached)) => {
                        tracing::debug!(%identity, "serving cached response");
                        cached
                    }
                    Ok(None) => offline_api_response(&identity),
                    Err(e) => {
                        tracing::warn!(%identity, error = %e, "cache lookup failed");
                        offline_api_response(&identity)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFetcher;
    use aquasentry_core::{CacheDb, RequestIdentity};

    async fn setup() -> (Arc<ScriptedFetcher>, Arc<CacheDb>, NetworkFirst) {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let cache = Arc::new(CacheDb::open_in_memory().await.unwrap());
        cache.open_store("v1").await.unwrap();
        let strategy = NetworkFirst::new(fetcher.clone(), cache.clone(), CachePolicy::default());
        (fetcher, cache, strategy)
    }

    #[tokio::test]
    async fn test_success_is_written_through() {
        let (fetcher, cache, strategy) = setup().await;
        fetcher.respond("/api/tanks", 200, r#"{"tanks":[1]}"#);

        let response = strategy.handle("v1", &InterceptedRequest::get("/api/tanks")).await;

        let stored = cache
            .match_entry("v1", &RequestIdentity::new("GET", "/api/tanks"))
            .await
            .unwrap();
        assert_eq!(stored, Some(response));
    }

    #[tokio::test]
    async fn test_online_then_offline_returns_last_success() {
        let (fetcher, _cache, strategy) = setup().await;
        fetcher.respond("/api/alerts", 200, r#"{"alerts":["A"]}"#);
        let request = InterceptedRequest::get("/api/alerts");

        let first = strategy.handle("v1", &request).await;
        fetcher.set_online(false);
        let second = strategy.handle("v1", &request).await;

        assert_eq!(second, first);
        assert_eq!(second.body.as_ref(), br#"{"alerts":["A"]}"#);
    }

    #[tokio::test]
    async fn test_offline_without_cache_synthesizes_error() {
        let (fetcher, _cache, strategy) = setup().await;
        fetcher.set_online(false);

        let response = strategy.handle("v1", &InterceptedRequest::get("/api/map")).await;

        assert_eq!(response.status, 503);
        let body = response.json().unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["offline"], true);
        assert!(body["cached_at"].is_null());
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_passes_through_uncached() {
        let (fetcher, cache, strategy) = setup().await;
        fetcher.respond("/api/tanks/T-9", 404, r#"{"detail":"Tank not found"}"#);

        let response = strategy.handle("v1", &InterceptedRequest::get("/api/tanks/T-9")).await;

        assert_eq!(response.status, 404);
        assert_eq!(cache.count_entries("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_overwrite_good_entry() {
        let (fetcher, cache, strategy) = setup().await;
        let request = InterceptedRequest::get("/api/analytics");
        fetcher.respond("/api/analytics", 200, "good");
        strategy.handle("v1", &request).await;

        fetcher.respond("/api/analytics", 500, "bad");
        let live = strategy.handle("v1", &request).await;
        assert_eq!(live.status, 500);

        let stored = cache.match_entry("v1", &request.identity()).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"good");
    }

    #[tokio::test]
    async fn test_non_cacheable_method_is_not_stored() {
        let (fetcher, cache, strategy) = setup().await;
        fetcher.respond("/api/recommendations", 200, r#"{"ok":true}"#);
        let mut request = InterceptedRequest::get("/api/recommendations");
        request.method = "POST".into();

        let response = strategy.handle("v1", &request).await;

        assert_eq!(response.status, 200);
        assert_eq!(cache.count_entries("v1").await.unwrap(), 0);
    }
}
