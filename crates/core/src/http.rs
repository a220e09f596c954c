//! Request and response snapshots exchanged between the interceptor,
//! the strategies and the cache store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::hash::compute_request_key;

/// Whether a request is a top-level page navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    Navigate,
    Subresource,
}

/// A request intercepted on its way from a page to the upstream origin.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Origin-relative path including the query string.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub mode: RequestMode,
}

impl InterceptedRequest {
    /// Build a bodiless `GET` for an origin-relative path.
    pub fn get(path: &str) -> Self {
        Self {
            method: "GET".to_string(),
            path: normalize_path(path),
            headers: Vec::new(),
            body: Bytes::new(),
            mode: RequestMode::Subresource,
        }
    }

    /// Build a page navigation `GET`.
    pub fn navigate(path: &str) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(path) }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// The identity this request is cached under.
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(&self.method, &self.path)
    }
}

/// Normalized request identity: upper-case method plus origin-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub path: String,
}

impl RequestIdentity {
    pub fn new(method: &str, path: &str) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), path: normalize_path(path) }
    }

    /// Hex SHA-256 cache key for this identity.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, &self.path)
    }
}

impl std::fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A response as served to a page or stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Normalize a path into origin-relative form.
///
/// Trims whitespace, drops any fragment, and guarantees a leading `/`.
/// The query string is kept verbatim.
pub fn normalize_path(input: &str) -> String {
    let trimmed = input.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or_default();

    if without_fragment.is_empty() {
        return "/".to_string();
    }

    if without_fragment.starts_with('/') {
        without_fragment.to_string()
    } else {
        format!("/{without_fragment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("  /dashboard "), "/dashboard");
        assert_eq!(normalize_path("api/tanks"), "/api/tanks");
        assert_eq!(normalize_path("/map#ward-3"), "/map");
        assert_eq!(normalize_path("/api/tanks?zone=north"), "/api/tanks?zone=north");
    }

    #[test]
    fn test_identity_normalizes_method() {
        let a = RequestIdentity::new("get", "/api/tanks");
        let b = RequestIdentity::new("GET", "api/tanks#x");
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.to_string(), "GET /api/tanks");
    }

    #[test]
    fn test_identity_distinguishes_method() {
        let get = RequestIdentity::new("GET", "/api/recommendations");
        let post = RequestIdentity::new("POST", "/api/recommendations");
        assert_ne!(get.key(), post.key());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = InterceptedRequest::get("/").with_header("Accept", "text/html");
        assert_eq!(req.header("accept"), Some("text/html"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(ResponseSnapshot::new(200, vec![], "").is_success());
        assert!(ResponseSnapshot::new(204, vec![], "").is_success());
        assert!(!ResponseSnapshot::new(304, vec![], "").is_success());
        assert!(!ResponseSnapshot::new(503, vec![], "").is_success());
    }

    #[test]
    fn test_navigate_constructor() {
        let req = InterceptedRequest::navigate("dashboard");
        assert!(req.is_navigation());
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/dashboard");
    }
}
