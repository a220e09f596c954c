//! Upstream origin parsing and origin-relative path resolution.

use aquasentry_core::http::normalize_path;

/// Error type for origin and path resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("path leaves the upstream origin: {0}")]
    CrossOrigin(String),
}

/// Parse the configured upstream into a bare origin.
///
/// Normalization steps:
/// 1. Trim whitespace, default the scheme to `http://`
/// 2. Lowercase the host
/// 3. Drop path, query and fragment
pub fn parse_origin(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("http://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| UrlError::InvalidUrl(format!("{trimmed} has no host")))?;
    parsed
        .set_host(Some(&host))
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_path("/");
    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve an origin-relative path against the upstream origin.
///
/// Rejects anything that would land on a different origin, such as
/// protocol-relative `//host/path` inputs.
pub fn resolve(origin: &url::Url, path: &str) -> Result<url::Url, UrlError> {
    let path = normalize_path(path);
    let resolved = origin.join(&path).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if resolved.origin() != origin.origin() {
        return Err(UrlError::CrossOrigin(path));
    }

    Ok(resolved)
}
