//! Turning a [`GatewayError`] into an HTTP response or an SSE event.

use axum::response::sse::Event;
use axum::response::IntoResponse;
use axum::Json;
use gateway_core::{Envelope, GatewayError};

/// The `api` block every error envelope carries, since error responses
/// don't have a convention-specific one to fall back on.
fn error_api_block() -> serde_json::Value {
    serde_json::json!({
        "name": "gateway",
        "type": "error",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "error response",
    })
}

/// Wraps [`GatewayError`] so it can be returned directly from an Axum
/// handler. Renders the same ordered envelope shape every other response
/// uses, with `error` in place of the semantic payload, and `links.home`/
/// `links.status` always attached (§7) so a client can recover without
/// re-deriving those URLs itself.
#[derive(Debug, Clone)]
pub struct RuntimeError(pub GatewayError);

impl From<GatewayError> for RuntimeError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl IntoResponse for RuntimeError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.0.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.0.retry_after;
        let envelope = Envelope::error(error_api_block(), self.0.to_value())
            .with_links(serde_json::json!({"home": "/", "status": "/health"}));
        let mut response = (status, Json(envelope.to_ordered_value())).into_response();
        if let Some(retry_after) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Build a structured SSE error event from a [`GatewayError`].
///
/// Unlike [`RuntimeError`]'s response body, this is a flat JSON object
/// (no envelope wrapper) — the SSE `event: error` type already
/// distinguishes it from data events, so the payload doesn't need to
/// repeat that distinction.
#[must_use]
pub fn sse_error_event(err: &GatewayError) -> Event {
    Event::default()
        .event("error")
        .json_data(err.to_value())
        .unwrap_or_else(|_| Event::default().event("error").data(err.message.clone()))
}
