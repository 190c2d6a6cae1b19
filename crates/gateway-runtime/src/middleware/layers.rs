//! Shared `tower` layers: CORS restricted to configured origins, request
//! tracing, and the `X-Request-Id` pair every response carries (§6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderValue, Request};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// A CORS layer scoped to `origins` (§4.17's `server.cors_origins`): any
/// configured origin is allowed, with the methods and headers the
/// tenant/confirm/response-mode conventions actually use. An empty list
/// falls back to permissive (any origin) — the default for a gateway
/// meant to be called from arbitrary frontends until an operator opts
/// into a stricter allow-list.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|origin| HeaderValue::from_str(origin).ok()).collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// A `tower-http` tracing layer logging method, path, status, and latency
/// for every request at `INFO` via the `tracing` facade the rest of the
/// gateway logs through.
#[must_use]
pub fn trace_layer() -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Generates an `X-Request-Id` value from a process-wide counter plus the
/// wall clock at process start — unique per request within a process
/// without pulling in a UUID dependency the rest of the stack doesn't
/// otherwise need.
#[derive(Clone)]
struct CounterRequestId {
    counter: Arc<AtomicU64>,
}

impl Default for CounterRequestId {
    fn default() -> Self {
        Self { counter: Arc::new(AtomicU64::new(0)) }
    }
}

impl MakeRequestId for CounterRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let value = HeaderValue::from_str(&format!("{millis:x}-{n:x}")).ok()?;
        Some(RequestId::new(value))
    }
}

/// A layer pair that sets `X-Request-Id` on the incoming request (if not
/// already present) and propagates it onto the outgoing response, so
/// every response carries one (§6) whether or not the caller supplied
/// it.
#[must_use]
pub fn request_id_layers() -> (SetRequestIdLayer<CounterRequestId>, PropagateRequestIdLayer) {
    let header = axum::http::HeaderName::from_static("x-request-id");
    (SetRequestIdLayer::new(header.clone(), CounterRequestId::default()), PropagateRequestIdLayer::new(header))
}
