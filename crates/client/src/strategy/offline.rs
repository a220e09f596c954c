//! Responses synthesized when neither the network nor the cache can answer.

use aquasentry_core::{RequestIdentity, ResponseSnapshot};
use serde::Serialize;

/// Status used for every synthesized offline response.
pub const OFFLINE_STATUS: u16 = 503;

#[derive(Debug, Serialize)]
struct OfflinePayload {
    success: bool,
    offline: bool,
    error: String,
    cached_at: Option<String>,
}

/// Structured JSON error for a dynamic request with no network and no cache.
pub fn offline_api_response(identity: &RequestIdentity) -> ResponseSnapshot {
    let payload = OfflinePayload {
        success: false,
        offline: true,
        error: format!("You are offline and no cached data is available for {identity}"),
        cached_at: None,
    };
    let body = serde_json::to_vec(&payload).unwrap_or_else(|_| br#"{"success":false,"offline":true}"#.to_vec());

    ResponseSnapshot::new(OFFLINE_STATUS, vec![("content-type".into(), "application/json".into())], body)
}

/// Plain-text fallback for a static, non-navigation request.
pub fn offline_text_response() -> ResponseSnapshot {
    ResponseSnapshot::new(
        OFFLINE_STATUS,
        vec![("content-type".into(), "text/plain; charset=utf-8".into())],
        "Offline",
    )
}

/// Answer for a request from an uncontrolled client whose fetch failed.
pub fn bad_gateway_response(reason: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(
        502,
        vec![("content-type".into(), "text/plain; charset=utf-8".into())],
        format!("Bad Gateway: {reason}"),
    )
}
