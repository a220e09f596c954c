//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Methods that never have side effects and may therefore be cached.
const READ_ONLY_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_origin_relative(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// Same rule the router classifies by: the query is ignored and the bare
/// prefix without its trailing slash also counts as API.
fn is_under_prefix(path: &str, api_prefix: &str) -> bool {
    let path = path.split('?').next().unwrap_or_default();
    let bare = api_prefix.trim_end_matches('/');
    path.starts_with(api_prefix) || (!bare.is_empty() && path == bare)
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        match url::Url::parse(&self.upstream) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            Ok(u) => return Err(invalid("upstream", format!("unsupported origin: {u}"))),
            Err(e) => return Err(invalid("upstream", e.to_string())),
        }

        if !is_origin_relative(&self.api_prefix) {
            return Err(invalid("api_prefix", "must start with a single '/'"));
        }

        for entry in &self.manifest {
            if !is_origin_relative(entry) {
                return Err(invalid("manifest", format!("{entry} is not origin-relative")));
            }
            if is_under_prefix(entry, &self.api_prefix) {
                return Err(invalid("manifest", format!("{entry} is an API path")));
            }
        }

        if !self.manifest.iter().any(|entry| entry == &self.offline_page) {
            return Err(invalid("offline_page", format!("{} must be listed in manifest", self.offline_page)));
        }

        if let Some(entry) = self.priming_endpoints.iter().find(|p| !is_origin_relative(p)) {
            return Err(invalid("priming_endpoints", format!("{entry} is not origin-relative")));
        }

        if self.cacheable_methods.is_empty() {
            return Err(invalid("cacheable_methods", "must list at least one method"));
        }
        if let Some(method) = self
            .cacheable_methods
            .iter()
            .find(|m| !READ_ONLY_METHODS.contains(&m.to_ascii_uppercase().as_str()))
        {
            return Err(invalid("cacheable_methods", format!("{method} is not a read-only method")));
        }

        if self.max_entries == Some(0) {
            return Err(invalid("max_entries", "must be greater than 0 when set"));
        }

        if self.max_clients == 0 {
            return Err(invalid("max_clients", "must be greater than 0"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.skip_waiting {
            tracing::debug!("skip_waiting disabled; new versions wait for a SKIP_WAITING message");
        }

        Ok(())
    }
}
