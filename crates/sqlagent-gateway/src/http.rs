//! Shared HTTP response helpers.
//!
//! Centralizes status-code checks so the route functions in
//! [`crate::queries`] stay focused on request construction and decoding.

use serde::Deserialize;

use crate::error::GatewayError;

/// Error body shapes the backend produces: `{"detail": ...}` from the API
/// framework, `{"error": "..."}` from proxies in front of it.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Return the response unchanged on success, otherwise a
/// [`GatewayError::Server`] carrying the most readable message available.
///
/// 404 is left to the caller, which knows what was not found.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::Server {
        status: status.as_u16(),
        message: error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string()),
    })
}

/// Extract a human-readable message from an error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
            ..
        }) => Some(detail),
        // Validation failures arrive as a structured list; keep it verbatim.
        Ok(ErrorBody {
            detail: Some(detail),
            ..
        }) => Some(detail.to_string()),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => Some(error),
        _ => Some(trimmed.to_string()),
    }
}
