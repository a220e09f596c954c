//! Request classification and dispatch.

use super::{CacheFirst, CachePolicy, NetworkFirst, Revalidator};
use crate::fetch::Fetcher;
use aquasentry_core::{AppConfig, CacheStorage, InterceptedRequest, ResponseSnapshot};
use serde::Serialize;
use std::sync::Arc;

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// API data: network-first.
    Dynamic,
    /// Pages and assets: cache-first with revalidation.
    Static,
}

/// Classify an origin-relative path against the API prefix.
///
/// The query string is ignored, and the bare prefix without its trailing
/// slash (e.g. `/api`) also counts as dynamic.
pub fn classify(path: &str, api_prefix: &str) -> RequestClass {
    let path = path.split('?').next().unwrap_or_default();
    let bare = api_prefix.trim_end_matches('/');

    if path.starts_with(api_prefix) || (!bare.is_empty() && path == bare) {
        RequestClass::Dynamic
    } else {
        RequestClass::Static
    }
}

/// Routes every intercepted request to exactly one strategy.
#[derive(Clone)]
pub struct Router {
    api_prefix: String,
    network_first: NetworkFirst,
    cache_first: CacheFirst,
}

impl Router {
    pub fn new(api_prefix: &str, network_first: NetworkFirst, cache_first: CacheFirst) -> Self {
        Self { api_prefix: api_prefix.to_string(), network_first, cache_first }
    }

    /// Wire both strategies from the application configuration.
    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>) -> Self {
        let policy = CachePolicy::from_config(config);
        let network_first = NetworkFirst::new(fetcher.clone(), cache.clone(), policy.clone());
        let cache_first = CacheFirst::new(fetcher, cache, policy, &config.offline_page);
        Self::new(&config.api_prefix, network_first, cache_first)
    }

    pub fn classify(&self, request: &InterceptedRequest) -> RequestClass {
        classify(&request.path, &self.api_prefix)
    }

    /// Serve `request` out of `store` with the strategy its class calls for.
    pub async fn route(&self, store: &str, request: &InterceptedRequest) -> ResponseSnapshot {
        match self.classify(request) {
            RequestClass::Dynamic => self.network_first.handle(store, request).await,
            RequestClass::Static => self.cache_first.handle(store, request).await,
        }
    }

    pub fn revalidator(&self) -> &Revalidator {
        self.cache_first.revalidator()
    }
}
