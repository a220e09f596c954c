//! Worker lifecycle: install, activate, control messages and fetch dispatch.
//!
//! ### States
//! `Installing → Installed (waiting) → Activating → Activated`, or
//! `Installing → Redundant` when preloading fails.
//!
//! ### Ordering
//! - Activation deletes every stale store before claiming clients, and
//!   claims clients before reporting `Activated`.
//! - Install and activate never interleave; they share one transition lock.
//!
//! ### Failure semantics
//! - Install fails closed: the new store never becomes active and the
//!   previous store keeps serving.
//! - Stale-store deletion is best effort: failures are logged and
//!   activation continues.

pub mod clients;
pub mod message;
pub mod preload;
pub mod prime;

pub use clients::ClientRegistry;
pub use message::ControlMessage;
pub use preload::Preloader;
pub use prime::{PrimeFailure, PrimeReport, Primer};

use crate::fetch::Fetcher;
use crate::strategy::offline::bad_gateway_response;
use crate::strategy::{RefreshCounts, Router};
use aquasentry_core::{AppConfig, CacheStorage, Error, InterceptedRequest, ResponseSnapshot};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Created, nothing attempted yet.
    Parsed,
    Installing,
    /// Installed and waiting for the previous version to step aside.
    Installed,
    Activating,
    /// Serving requests from this version's store.
    Activated,
    /// Installation failed; this version will never serve.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Lifecycle settings for one deployed version.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub version: String,
    pub manifest: Vec<String>,
    pub priming_endpoints: Vec<String>,
    pub skip_waiting: bool,
    pub max_entries: Option<usize>,
    pub max_clients: usize,
}

impl WorkerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            version: config.cache_version.clone(),
            manifest: config.manifest.clone(),
            priming_endpoints: config.priming_endpoints.clone(),
            skip_waiting: config.skip_waiting,
            max_entries: config.max_entries,
            max_clients: config.max_clients,
        }
    }
}

/// What an activation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    /// Stale stores removed, in deletion order.
    pub deleted: Vec<String>,
    /// Clients now controlled by this version.
    pub claimed: usize,
    /// Entries dropped to respect `max_entries`.
    pub trimmed: u64,
}

/// Result of handling a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Unknown message shape; nothing happened.
    Ignored,
    /// SKIP_WAITING accepted. `activation` is set if it activated this version now.
    SkipWaiting { activation: Option<ActivationReport> },
    /// CACHE_OFFLINE_DATA ran the bulk primer.
    Primed(PrimeReport),
}

/// Snapshot of the worker for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub version: String,
    pub active_store: Option<String>,
    pub stores: Vec<String>,
    pub active_entries: Option<u64>,
    pub clients: usize,
    pub revalidation: RefreshCounts,
}

/// The offline worker: owns the current store version and routes fetches.
pub struct Worker {
    options: WorkerOptions,
    cache: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    router: Router,
    preloader: Preloader,
    primer: Primer,
    clients: ClientRegistry,
    state: RwLock<WorkerState>,
    active_store: RwLock<Option<String>>,
    skip_waiting_requested: AtomicBool,
    transition: Mutex<()>,
}

impl Worker {
    pub fn new(options: WorkerOptions, router: Router, fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>) -> Self {
        Self {
            preloader: Preloader::new(fetcher.clone(), cache.clone()),
            primer: Primer::new(fetcher.clone(), cache.clone()),
            clients: ClientRegistry::with_capacity(options.max_clients),
            options,
            cache,
            fetcher,
            router,
            state: RwLock::new(WorkerState::Parsed),
            active_store: RwLock::new(None),
            skip_waiting_requested: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    /// Build a worker and its router from the application configuration.
    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn Fetcher>, cache: Arc<dyn CacheStorage>) -> Self {
        let router = Router::from_config(config, fetcher.clone(), cache.clone());
        Self::new(WorkerOptions::from_config(config), router, fetcher, cache)
    }

    pub fn version(&self) -> &str {
        &self.options.version
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Store currently serving requests, if any version is active.
    pub async fn active_store(&self) -> Option<String> {
        self.active_store.read().await.clone()
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    async fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::info!(version = %self.options.version, from = %*state, to = %next, "worker state change");
            *state = next;
        }
    }

    /// Bring this version up: install if needed, then activate unless it
    /// has to wait behind a previous version.
    ///
    /// # Errors
    ///
    /// Returns the install error if preloading fails. The newest previous
    /// store, if any, is left serving.
    pub async fn start(&self) -> Result<WorkerState, Error> {
        let stores = self
            .cache
            .keys()
            .await
            .map_err(|e| Error::InstallFailed(format!("cache store unavailable: {e}")))?;

        let previous = stores.iter().find(|s| **s != self.options.version).cloned();
        *self.active_store.write().await = previous.clone();

        if stores.contains(&self.options.version) {
            tracing::info!(version = %self.options.version, "store already installed");
            self.set_state(WorkerState::Installed).await;
        } else {
            self.install().await?;
        }

        let skip = self.options.skip_waiting || self.skip_waiting_requested.load(Ordering::SeqCst);
        if previous.is_none() || skip {
            self.activate().await?;
        } else {
            tracing::info!(
                version = %self.options.version,
                serving = previous.as_deref().unwrap_or_default(),
                "installed, waiting for SKIP_WAITING"
            );
        }

        Ok(self.state().await)
    }

    /// Preload the manifest into a fresh store named after this version.
    pub async fn install(&self) -> Result<usize, Error> {
        let _guard = self.transition.lock().await;
        self.set_state(WorkerState::Installing).await;

        match self.preloader.preload(&self.options.version, &self.options.manifest).await {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                Ok(count)
            }
            Err(e) => {
                tracing::error!(version = %self.options.version, error = %e, "install failed");
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Delete stale stores, take over serving, then claim every client.
    ///
    /// Safe to run repeatedly; a second pass finds nothing left to delete.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.transition.lock().await;

        let current = self.state().await;
        if !matches!(current, WorkerState::Installed | WorkerState::Activated) {
            return Err(Error::InvalidState(format!("cannot activate from {current}")));
        }
        self.set_state(WorkerState::Activating).await;

        let version = self.options.version.clone();
        let mut deleted = Vec::new();

        match self.cache.keys().await {
            Ok(stores) => {
                for store in stores.into_iter().filter(|s| *s != version) {
                    match self.cache.delete(&store).await {
                        Ok(_) => {
                            tracing::info!(%store, "deleted stale cache store");
                            deleted.push(store);
                        }
                        Err(e) => tracing::warn!(%store, error = %e, "failed to delete stale cache store"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not list cache stores during activation"),
        }

        let trimmed = self.trim(&version).await;

        *self.active_store.write().await = Some(version.clone());
        let claimed = self.clients.claim(&version).await;
        self.set_state(WorkerState::Activated).await;

        Ok(ActivationReport { version, deleted, claimed, trimmed })
    }

    async fn trim(&self, store: &str) -> u64 {
        let Some(max) = self.options.max_entries else {
            return 0;
        };
        match self.cache.trim(store, max).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%store, error = %e, "failed to trim cache store");
                0
            }
        }
    }

    /// Handle a control message from a page. Unknown shapes are ignored.
    pub async fn handle_message(&self, payload: &serde_json::Value) -> MessageOutcome {
        let Some(message) = ControlMessage::parse(payload) else {
            tracing::debug!("ignoring unrecognized control message");
            return MessageOutcome::Ignored;
        };
        tracing::info!(message = message.as_str(), "control message");

        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting_requested.store(true, Ordering::SeqCst);
                let activation = if self.state().await == WorkerState::Installed {
                    match self.activate().await {
                        Ok(report) => Some(report),
                        Err(e) => {
                            tracing::warn!(error = %e, "skip-waiting activation failed");
                            None
                        }
                    }
                } else {
                    None
                };
                MessageOutcome::SkipWaiting { activation }
            }
            ControlMessage::CacheOfflineData => MessageOutcome::Primed(self.prime().await),
        }
    }

    /// Run the bulk primer against the store that is currently serving.
    ///
    /// A version still waiting (or one that failed to install) never receives
    /// primed data; with no active store nothing is fetched.
    pub async fn prime(&self) -> PrimeReport {
        let Some(store) = self.active_store().await else {
            tracing::warn!(version = %self.options.version, "no active cache store, priming skipped");
            return PrimeReport::unavailable(&self.options.priming_endpoints, "no active cache store");
        };

        let report = self.primer.prime(&store, &self.options.priming_endpoints).await;
        self.trim(&store).await;
        report
    }

    /// Background-sync hook. Queued offline writes are not replayed.
    pub async fn handle_sync(&self, tag: &str) {
        tracing::debug!(%tag, "background sync requested; nothing to replay");
    }

    /// Serve an intercepted request.
    ///
    /// With an active store the request is routed through the strategies;
    /// otherwise the client is uncontrolled and goes straight to the network.
    pub async fn handle_fetch(&self, client_id: Option<&str>, request: &InterceptedRequest) -> ResponseSnapshot {
        let store = self.active_store().await;

        if let Some(id) = client_id {
            self.clients.register(id, store.as_deref()).await;
        }

        match store {
            Some(store) => self.router.route(&store, request).await,
            None => match self.fetcher.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(identity = %request.identity(), error = %e, "uncontrolled fetch failed");
                    bad_gateway_response(&e.to_string())
                }
            },
        }
    }

    pub async fn status(&self) -> WorkerStatus {
        let active_store = self.active_store().await;
        let stores = self.cache.keys().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not list cache stores");
            Vec::new()
        });
        let active_entries = match &active_store {
            Some(store) => self.cache.entry_count(store).await.ok(),
            None => None,
        };

        WorkerStatus {
            state: self.state().await,
            version: self.options.version.clone(),
            active_store,
            stores,
            active_entries,
            clients: self.clients.count().await,
            revalidation: self.router.revalidator().counts(),
        }
    }
}
