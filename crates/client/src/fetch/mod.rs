//! Upstream fetch pipeline.
//!
//! ### Contract
//! - Transport failures (no network, DNS, reset, timeout, oversize body)
//!   come back as `Err`.
//! - Any HTTP status, including 4xx/5xx, comes back as `Ok`; deciding what
//!   to do with it is the strategy's job.
//!
//! ### Safety Gates
//! - Paths are resolved against the configured upstream origin only.
//! - Hop-by-hop headers are dropped in both directions.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use aquasentry_core::{AppConfig, Error, InterceptedRequest, ResponseSnapshot};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, parse_origin, resolve};

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
    "content-encoding",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Network-fetch primitive consumed by the strategies.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Send `request` upstream and return whatever the server answered.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upstream origin every origin-relative path resolves against.
    pub upstream: ::url::Url,

    /// User agent string (default: "aquasentry-offline/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Build fetch settings from the application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let upstream = parse_origin(&config.upstream).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            upstream,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: 5,
        })
    }
}

/// HTTP client that forwards intercepted requests to the upstream origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let url = resolve(&self.config.upstream, &request.path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, url.clone());
        for (name, value) in &request.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => tracing::debug!("dropping malformed request header {}", name),
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResponseSnapshot::new(status.as_u16(), headers, bytes))
    }
}
