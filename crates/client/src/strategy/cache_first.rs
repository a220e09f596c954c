//! Cache-first strategy with background revalidation for static requests.

use super::offline::offline_text_response;
use super::{CachePolicy, Revalidator};
use crate::fetch::Fetcher;
use aquasentry_core::{CacheStorage, InterceptedRequest, RequestIdentity, ResponseSnapshot};
use std::sync::Arc;

/// Serve from the cache when possible, refreshing the entry in the background.
///
/// On a miss the network answer is stored and returned. When the network is
/// unreachable, navigations get the preloaded offline page and everything
/// else gets a plain 503.
#[derive(Clone)]
pub struct CacheFirst {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStorage>,
    policy: CachePolicy,
    offline_page: RequestIdentity,
    revalidator: Revalidator,
}

impl CacheFirst {
    pub fn new(
        fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>, policy: CachePolicy, offline_page: &str,
    ) -> Self {
        let revalidator = Revalidator::new(fetcher.clone(), cache.clone(), policy.clone());
        Self { fetcher, cache, policy, offline_page: RequestIdentity::new("GET", offline_page), revalidator }
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    pub async fn handle(&self, store: &str, request: &InterceptedRequest) -> ResponseSnapshot {
        let identity = request.identity();

        match self.cache.match_entry(store, &identity).await {
            Ok(Some(cached)) => {
                tracing::debug!(%identity, "cache hit");
                self.revalidator.submit(store, request.clone());
                return cached;
            }
            Ok(None) => tracing::debug!(%identity, "cache miss"),
            Err(e) => tracing::warn!(%identity, error = %e, "cache lookup failed, treating as miss"),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if self.policy.should_store(request, &response)
                    && let Err(e) = self.cache.put(store, &identity, &response).await
                {
                    tracing::warn!(%identity, error = %e, "failed to cache response");
                }
                response
            }
            Err(err) => {
                tracing::debug!(%identity, error = %err, "network failed on cache miss");
                if request.is_navigation() {
                    match self.cache.match_entry(store, &self.offline_page).await {
                        Ok(Some(page)) => return page,
                        Ok(None) => tracing::warn!(page = %self.offline_page, "offline page missing from cache"),
                        Err(e) => tracing::warn!(error = %e, "offline page lookup failed"),
                    }
                }
                offline_text_response()
            }
        }
    }
}
