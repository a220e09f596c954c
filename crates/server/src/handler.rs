//! HTTP surface of the interceptor.
//!
//! Every request outside `/__worker` is converted into an
//! [`InterceptedRequest`] and handed to the worker. The reserved prefix
//! carries the page-to-worker message channel and a status endpoint.

use crate::error::ServerError;
use aquasentry_client::{MessageOutcome, Worker, WorkerStatus};
use aquasentry_core::{InterceptedRequest, RequestMode, ResponseSnapshot};
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;

/// Header a page may send to identify itself across requests.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    worker: Arc<Worker>,
    max_bytes: usize,
}

impl AppState {
    pub fn new(worker: Arc<Worker>, max_bytes: usize) -> Self {
        Self { worker, max_bytes }
    }
}

/// Build the interceptor router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/__worker/message", post(message))
        .route("/__worker/status", get(status))
        .fallback(intercept)
        .with_state(state)
}

async fn message(State(state): State<AppState>, body: Bytes) -> Json<MessageOutcome> {
    // Malformed payloads are treated like unknown messages.
    let payload = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    Json(state.worker.handle_message(&payload).await)
}

async fn status(State(state): State<AppState>) -> Json<WorkerStatus> {
    Json(state.worker.status().await)
}

async fn intercept(State(state): State<AppState>, request: Request) -> Result<Response, ServerError> {
    let client_id = client_id(&request);
    let intercepted = to_intercepted(request, state.max_bytes).await?;

    tracing::debug!(identity = %intercepted.identity(), client = ?client_id, "intercepted");
    let snapshot = state.worker.handle_fetch(client_id.as_deref(), &intercepted).await;

    into_response(snapshot)
}

/// Explicit client id header, else the peer IP.
///
/// The ephemeral port is left out so reconnects from one host stay one client.
fn client_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

/// Top-level page loads announce themselves with `Sec-Fetch-Mode: navigate`;
/// older agents are recognized by a GET that accepts HTML.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(mode) = header("sec-fetch-mode") {
        return mode.eq_ignore_ascii_case("navigate");
    }
    method == Method::GET && header("accept").is_some_and(|accept| accept.contains("text/html"))
}

async fn to_intercepted(request: Request, max_bytes: usize) -> Result<InterceptedRequest, ServerError> {
    let (parts, body) = request.into_parts();

    let mode = if is_navigation(&parts.method, &parts.headers) { RequestMode::Navigate } else { RequestMode::Subresource };
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    let body = axum::body::to_bytes(body, max_bytes)
        .await
        .map_err(|e| ServerError::PayloadTooLarge(format!("{path}: {e}")))?;

    Ok(InterceptedRequest { method: parts.method.as_str().to_string(), path, headers, body, mode })
}

fn into_response(snapshot: ResponseSnapshot) -> Result<Response, ServerError> {
    let status = StatusCode::from_u16(snapshot.status)
        .map_err(|e| ServerError::Internal(format!("status {}: {e}", snapshot.status)))?;

    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in &snapshot.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => tracing::debug!("dropping malformed response header {}", name),
        }
    }

    builder
        .body(Body::from(snapshot.body))
        .map_err(|e| ServerError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquasentry_client::Fetcher;
    use aquasentry_core::{AppConfig, CacheDb, Error};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    struct StubUpstream {
        pages: HashMap<&'static str, &'static str>,
        online: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Fetcher for StubUpstream {
        async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(match self.pages.get(request.path.as_str()) {
                Some(body) => ResponseSnapshot::new(200, vec![("content-type".into(), "text/html".into())], *body),
                None => ResponseSnapshot::new(404, vec![], "Not Found"),
            })
        }
    }

    async fn setup(max_bytes: usize) -> (Router, Arc<StubUpstream>, Arc<Worker>) {
        let upstream = Arc::new(StubUpstream {
            pages: HashMap::from([
                ("/", "<h1>AquaSentry</h1>"),
                ("/offline", "<h1>Offline</h1>"),
                ("/api/tanks", r#"{"tanks":[]}"#),
            ]),
            online: AtomicBool::new(true),
        });
        let config = AppConfig {
            cache_version: "v1".into(),
            manifest: vec!["/".into(), "/offline".into()],
            offline_page: "/offline".into(),
            priming_endpoints: vec!["/api/tanks".into()],
            max_bytes,
            ..Default::default()
        };
        let cache = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let worker = Arc::new(Worker::from_config(&config, upstream.clone(), cache));
        worker.start().await.unwrap();

        (app(AppState::new(worker.clone(), max_bytes)), upstream, worker)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_navigation_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_navigation(&Method::GET, &headers));

        headers.insert("accept", HeaderValue::from_static("text/html,application/xhtml+xml"));
        assert!(is_navigation(&Method::GET, &headers));
        assert!(!is_navigation(&Method::POST, &headers));

        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        assert!(!is_navigation(&Method::GET, &headers));

        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        assert!(is_navigation(&Method::GET, &headers));
    }

    #[test]
    fn test_client_id_ignores_peer_port() {
        let from_port = |port: u16| {
            let mut request = get("/");
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], port))));
            client_id(&request)
        };

        assert_eq!(from_port(51000).as_deref(), Some("192.168.1.20"));
        assert_eq!(from_port(51000), from_port(62311));
    }

    #[test]
    fn test_client_id_header_wins_over_peer() {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .header(CLIENT_ID_HEADER, "tab-7")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))));

        assert_eq!(client_id(&request).as_deref(), Some("tab-7"));
        assert_eq!(client_id(&get("/")), None);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (app, _, _) = setup(1024).await;
        let response = app.oneshot(get("/__worker/status")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["state"], "activated");
        assert_eq!(json["active_store"], "v1");
        assert_eq!(json["active_entries"], 2);
    }

    #[tokio::test]
    async fn test_message_endpoint_ignores_unknown_payloads() {
        let (app, _, _) = setup(1024).await;
        for body in [r#"{"type":"PURGE"}"#, "not json"] {
            let request = axum::http::Request::builder()
                .method("POST")
                .uri("/__worker/message")
                .body(Body::from(body))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(body_json(response).await, serde_json::json!({"outcome": "ignored"}));
        }
    }

    #[tokio::test]
    async fn test_message_endpoint_primes() {
        let (app, upstream, _) = setup(1024).await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/__worker/message")
            .body(Body::from(r#"{"type":"CACHE_OFFLINE_DATA"}"#))
            .unwrap();
        let json = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(json["outcome"], "primed");
        assert_eq!(json["cached"], serde_json::json!(["/api/tanks"]));

        upstream.online.store(false, Ordering::SeqCst);
        let response = app.oneshot(get("/api/tanks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"tanks": []}));
    }

    #[tokio::test]
    async fn test_static_served_from_cache_when_offline() {
        let (app, upstream, worker) = setup(1024).await;
        upstream.online.store(false, Ordering::SeqCst);

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>AquaSentry</h1>");

        worker.router().revalidator().wait_idle().await;
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let (app, upstream, _) = setup(1024).await;
        upstream.online.store(false, Ordering::SeqCst);

        let request = axum::http::Request::builder()
            .uri("/dashboard")
            .header("sec-fetch-mode", "navigate")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>Offline</h1>");
    }

    #[tokio::test]
    async fn test_offline_api_without_cache_is_503_json() {
        let (app, upstream, _) = setup(1024).await;
        upstream.online.store(false, Ordering::SeqCst);

        let response = app.oneshot(get("/api/alerts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["offline"], true);
    }

    #[tokio::test]
    async fn test_client_id_header_registers_client() {
        let (app, _, worker) = setup(1024).await;
        let request = axum::http::Request::builder()
            .uri("/")
            .header(CLIENT_ID_HEADER, "tab-7")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap();

        assert_eq!(worker.clients().controller_of("tab-7").await.as_deref(), Some("v1"));
        worker.router().revalidator().wait_idle().await;
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let (app, _, _) = setup(8).await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/ai/copilot")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
