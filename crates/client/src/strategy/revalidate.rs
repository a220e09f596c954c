//! Fire-and-forget background refresh of cached static entries.
//!
//! Each submitted refresh runs as its own detached task; the submitting
//! request never waits on it. Outcomes land in [`RefreshCounts`] and the
//! debug log instead of being surfaced to callers.

use super::CachePolicy;
use crate::fetch::Fetcher;
use aquasentry_core::{CacheStorage, InterceptedRequest};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    refreshed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
}

/// Point-in-time view of the background refresh counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshCounts {
    pub submitted: u64,
    /// Entry overwritten with a fresh response.
    pub refreshed: u64,
    /// Upstream answered with a status that is not stored.
    pub skipped: u64,
    /// Network or cache failure; swallowed.
    pub failed: u64,
    pub in_flight: u64,
}

/// Background revalidation queue for cache-first hits.
#[derive(Clone)]
pub struct Revalidator {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStorage>,
    policy: CachePolicy,
    counters: Arc<Counters>,
    idle: Arc<Notify>,
}

impl Revalidator {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>, policy: CachePolicy) -> Self {
        Self { fetcher, cache, policy, counters: Arc::new(Counters::default()), idle: Arc::new(Notify::new()) }
    }

    /// Queue a refresh of `request` into `store` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, store: &str, request: InterceptedRequest) {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);

        let this = self.clone();
        let store = store.to_string();
        tokio::spawn(async move {
            this.refresh(&store, &request).await;
            if this.counters.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                this.idle.notify_waiters();
            }
        });
    }

    async fn refresh(&self, store: &str, request: &InterceptedRequest) {
        let identity = request.identity();

        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(%identity, error = %e, "background refresh failed");
                return;
            }
        };

        if !self.policy.should_store(request, &response) {
            self.counters.skipped.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(%identity, status = response.status, "background refresh not stored");
            return;
        }

        match self.cache.put(store, &identity, &response).await {
            Ok(()) => {
                self.counters.refreshed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(%identity, "background refresh stored");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(%identity, error = %e, "background refresh write failed");
            }
        }
    }

    pub fn counts(&self) -> RefreshCounts {
        RefreshCounts {
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            refreshed: self.counters.refreshed.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
        }
    }

    /// Wait until no refresh is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.counters.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
