//! Structured errors for the interceptor's HTTP surface.
//!
//! Strategy outcomes are always responses; these cover only request
//! conversion at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Request body exceeds the configured `max_bytes`.
    #[error("PAYLOAD_TOO_LARGE: {0}")]
    PayloadTooLarge(String),

    /// A response snapshot could not be turned back into HTTP.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ServerError {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.code();
        let message = match &self {
            ServerError::PayloadTooLarge(msg) | ServerError::Internal(msg) => msg.clone(),
        };
        tracing::warn!(%code, %message, "request rejected");

        (status, Json(serde_json::json!({ "error": code, "message": message }))).into_response()
    }
}
