//! Assembling [`AppState`] into a runnable [`axum::Router`].

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::dispatch::dispatch;
use crate::state::AppState;

/// Build the router every request enters through: a single catch-all
/// handler wearing the tracing, CORS, and request-id layers, with `state`
/// threaded in for extraction.
///
/// There is no per-resource Axum routing tree — `gateway_core::classify`
/// already parses a path (including any `~tenant` prefix) into a
/// [`gateway_core::RouteKind`], so mounting `/{collection}`, `/{id}`, and
/// so on as separate Axum routes would just re-derive that decision a
/// second time, with its own chance to disagree.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let (set_request_id, propagate_request_id) = gateway_runtime::middleware::request_id_layers();
    let cors = gateway_runtime::middleware::cors_layer(&state.config.server.cors_origins);
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Dependencies;
    use gateway_conventions::GatewayConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> Router {
        let mut config = GatewayConfig::default();
        config.confirm.secret = "test-secret".to_string();
        build_router(AppState::new(config, Dependencies::default()))
    }

    #[tokio::test]
    async fn health_like_unknown_path_reports_not_found_envelope() {
        let response = router()
            .oneshot(axum::http::Request::get("/totally-unmapped-thing").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn rpc_list_is_reachable_through_the_assembled_router() {
        let response = router()
            .oneshot(axum::http::Request::get("/rpc").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["methods"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn me_reports_anonymous_by_default() {
        let response = router()
            .oneshot(axum::http::Request::get("/me").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["user"]["authenticated"], false);
    }
}
