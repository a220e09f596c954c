//! Install-time preloading of the static manifest.
//!
//! All manifest entries are fetched concurrently, and only once every one
//! of them has succeeded are they written to the new store, in a single
//! transaction. One failure aborts the whole install.

use crate::fetch::Fetcher;
use aquasentry_core::{CacheStorage, Error, InterceptedRequest, RequestIdentity, ResponseSnapshot};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Populates a fresh store from the manifest, all-or-nothing.
#[derive(Clone)]
pub struct Preloader {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn CacheStorage>,
}

impl Preloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>) -> Self {
        Self { fetcher, cache }
    }

    /// Fetch every manifest entry and store them in `store`.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// `Error::InstallFailed` if any entry fails to fetch, answers with a
    /// non-success status, or the batch cannot be written.
    pub async fn preload(&self, store: &str, manifest: &[String]) -> Result<usize, Error> {
        let mut join_set = JoinSet::new();

        for (index, path) in manifest.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let request = InterceptedRequest::get(path);
            join_set.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut slots: Vec<Option<(RequestIdentity, ResponseSnapshot)>> = vec![None; manifest.len()];

        // NOTE: returning early drops the JoinSet, which aborts outstanding fetches
        while let Some(joined) = join_set.join_next().await {
            let (index, request, result) =
                joined.map_err(|e| Error::InstallFailed(format!("preload task failed: {e}")))?;

            let response = match result {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    return Err(Error::InstallFailed(format!("{}: status {}", request.path, response.status)));
                }
                Err(e) => return Err(Error::InstallFailed(format!("{}: {e}", request.path))),
            };

            slots[index] = Some((request.identity(), response));
        }

        let entries: Vec<_> = slots.into_iter().flatten().collect();
        let count = entries.len();

        self.cache
            .put_all(store, entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("writing store {store}: {e}")))?;

        tracing::info!(store, entries = count, "preloaded manifest");
        Ok(count)
    }
}
