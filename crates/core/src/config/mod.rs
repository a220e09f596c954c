//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (AQUASENTRY_*)
//! 2. TOML config file (if AQUASENTRY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (AQUASENTRY_*)
/// 2. TOML config file (if AQUASENTRY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version tag of the cache store this deployment installs.
    ///
    /// Bumping it on deploy makes activation delete every older store.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the dashboard backend, e.g. `http://127.0.0.1:5000`.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Address the interceptor listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path prefix that marks a request as dynamic (network-first).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Page served to failed navigations. Must appear in `manifest`.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Static resources preloaded at install time.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Data endpoints fetched on a CACHE_OFFLINE_DATA message.
    #[serde(default = "default_priming_endpoints")]
    pub priming_endpoints: Vec<String>,

    /// Methods whose successful responses may be written to the cache.
    #[serde(default = "default_cacheable_methods")]
    pub cacheable_methods: Vec<String>,

    /// Activate a freshly installed version without waiting for SKIP_WAITING.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Upper bound on entries kept in the active store (unbounded if unset).
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Clients remembered by the worker before the least recently seen is dropped.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum request or response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_version() -> String {
    "aquasentry-v2".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./aquasentry-cache.sqlite")
}

fn default_upstream() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_offline_page() -> String {
    "/static/offline.html".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/login",
        "/dashboard",
        "/alerts",
        "/recommendations",
        "/map",
        "/maintenance",
        "/copilot",
        "/vision",
        "/manifest.json",
        "/static/offline.html",
        "/static/icons/icon-192.png",
        "/static/icons/icon-512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_priming_endpoints() -> Vec<String> {
    ["/api/tanks", "/api/alerts", "/api/map", "/api/analytics", "/api/offline-data"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cacheable_methods() -> Vec<String> {
    vec!["GET".into()]
}

fn default_max_clients() -> usize {
    1024
}

fn default_user_agent() -> String {
    "aquasentry-offline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            db_path: default_db_path(),
            upstream: default_upstream(),
            listen_addr: default_listen_addr(),
            api_prefix: default_api_prefix(),
            offline_page: default_offline_page(),
            manifest: default_manifest(),
            priming_endpoints: default_priming_endpoints(),
            cacheable_methods: default_cacheable_methods(),
            skip_waiting: true,
            max_entries: None,
            max_clients: default_max_clients(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("AQUASENTRY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("AQUASENTRY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
