//! On-demand warm-up of data endpoints ahead of going offline.

use crate::fetch::Fetcher;
use aquasentry_core::{CacheStorage, InterceptedRequest};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

/// A priming endpoint that could not be cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimeFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of a bulk priming run, in endpoint-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrimeReport {
    pub cached: Vec<String>,
    pub failed: Vec<PrimeFailure>,
}

impl PrimeReport {
    /// Report for a run that could not start: every endpoint failed with `reason`.
    pub fn unavailable(endpoints: &[String], reason: &str) -> Self {
        let failed = endpoints
            .iter()
            .map(|path| PrimeFailure { path: path.clone(), error: reason.to_string() })
            .collect();
        Self { cached: Vec::new(), failed }
    }
}

/// Fetches each priming endpoint independently; failures are isolated.
#[derive(Clone)]
pub struct Primer {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStorage>,
}

impl Primer {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>) -> Self {
        Self { fetcher, cache }
    }

    /// Fetch every endpoint and write successes into `store`, which must exist.
    pub async fn prime(&self, store: &str, endpoints: &[String]) -> PrimeReport {
        let mut join_set = JoinSet::new();

        for (index, path) in endpoints.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let cache = self.cache.clone();
            let store = store.to_string();
            let request = InterceptedRequest::get(path);
            join_set.spawn(async move {
                let outcome = async {
                    let response = fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
                    if !response.is_success() {
                        return Err(format!("status {}", response.status));
                    }
                    cache
                        .put(&store, &request.identity(), &response)
                        .await
                        .map_err(|e| e.to_string())
                }
                .await;
                (index, request.path, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(endpoints.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::warn!(error = %e, "priming task aborted"),
            }
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = PrimeReport::default();
        for (_, path, outcome) in outcomes {
            match outcome {
                Ok(()) => report.cached.push(path),
                Err(error) => {
                    tracing::warn!(%path, %error, "failed to prime endpoint");
                    report.failed.push(PrimeFailure { path, error });
                }
            }
        }

        tracing::info!(store, cached = report.cached.len(), failed = report.failed.len(), "bulk priming finished");
        report
    }
}
