//! End-to-end HTTP behavior driven through `tower::ServiceExt::oneshot`
//! against the fully assembled router: confirmation round trips,
//! transport equivalence across the URL/`/rpc`/`/mcp` surfaces, and
//! tenant resolution. Unlike the smoke tests in `app.rs`, these wire in
//! real `DatabaseBinding`/`GatewayFunction` test doubles so there's
//! actual convention behavior to exercise.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gateway_conventions::crud::{FieldSpec, ModelSchema};
use gateway_conventions::{DatabaseBinding, GatewayConfig};
use gateway_core::{Filter, GatewayError, SortSpec};
use gateway_registry::{GatewayFunction, GatewayRegistry};
use gateway_runtime::GatewayContext;
use gateway_server::{build_router, AppState, Dependencies};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// An in-memory `DatabaseBinding` that records the tenant it was called
/// with, for tenant-resolution assertions, and otherwise behaves like a
/// tiny single-model store.
#[derive(Default)]
struct RecordingDb {
    records: Mutex<Vec<Value>>,
    last_tenant: Mutex<Option<String>>,
}

#[async_trait]
impl DatabaseBinding for RecordingDb {
    async fn create(&self, _model: &str, tenant: &str, data: Value) -> Result<Value, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        self.records.lock().unwrap().push(data.clone());
        Ok(data)
    }
    async fn get(&self, _model: &str, tenant: &str, id: &str) -> Result<Option<Value>, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(self.records.lock().unwrap().iter().find(|r| r["id"] == id).cloned())
    }
    async fn update(&self, _model: &str, tenant: &str, _id: &str, data: Value) -> Result<Option<Value>, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(Some(data))
    }
    async fn delete(&self, _model: &str, tenant: &str, _id: &str) -> Result<bool, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(true)
    }
    async fn list(&self, _model: &str, tenant: &str, _filter: &Filter, _sort: &SortSpec, _limit: u64, _offset: u64) -> Result<Value, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(json!({ "data": [], "total": 0, "hasMore": false }))
    }
    async fn search(&self, _model: &str, tenant: &str, _query: &str) -> Result<Value, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(json!([]))
    }
    async fn count(&self, _model: &str, tenant: &str, _filter: &Filter) -> Result<u64, GatewayError> {
        *self.last_tenant.lock().unwrap() = Some(tenant.to_string());
        Ok(0)
    }
}

/// A registered function that hands its arguments straight back,
/// letting transport-equivalence tests compare the argument shape each
/// surface actually dispatched with.
struct Echo;

#[async_trait]
impl GatewayFunction for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echoes its arguments back"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "array"})
    }
    async fn call(&self, args: Value, _ctx: &GatewayContext) -> Result<Value, GatewayError> {
        Ok(json!({ "echo": args }))
    }
}

fn widget_schema() -> ModelSchema {
    ModelSchema {
        model: "widget".to_string(),
        fields: vec![FieldSpec {
            name: "name".to_string(),
            required: true,
            kind: "string".to_string(),
        }],
    }
}

fn router_with(db: std::sync::Arc<RecordingDb>, registry: GatewayRegistry) -> axum::Router {
    let mut config = GatewayConfig::default();
    config.confirm.secret = "test-secret".to_string();
    let mut schemas = BTreeMap::new();
    schemas.insert("widget".to_string(), widget_schema());
    let deps = Dependencies {
        database: db,
        registry,
        schemas,
        ..Dependencies::default()
    };
    build_router(AppState::new(config, deps))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn mutating_get_requires_a_confirm_round_trip() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());

    let preview = router.clone().oneshot(get("/widgets/create?name=Widget1")).await.unwrap();
    assert_eq!(preview.status(), StatusCode::OK);
    let preview = body_json(preview).await;
    assert_eq!(preview["confirm"]["action"], "create");
    let execute = preview["confirm"]["execute"].as_str().unwrap().to_string();
    assert!(execute.contains("confirm="));

    // Asking again without a token just re-issues the same preview, not an error.
    let repeated = router.clone().oneshot(get("/widgets/create?name=Widget1")).await.unwrap();
    let repeated = body_json(repeated).await;
    assert_eq!(repeated["confirm"]["action"], "create");

    let executed = router.clone().oneshot(get(&execute)).await.unwrap();
    assert_eq!(executed.status(), StatusCode::OK);
    let executed = body_json(executed).await;
    assert_eq!(executed["widget"]["name"], "Widget1");
}

#[tokio::test]
async fn forged_confirm_token_is_rejected() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());
    let forged = router.oneshot(get("/widgets/create?name=Widget1&confirm=not-a-real-hash")).await.unwrap();
    assert_eq!(forged.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entity_action_confirmation_round_trip() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().function(std::sync::Arc::new(Echo)).build());

    // `echo` isn't in the default mutating set, but any unknown lowercase
    // verb is treated as mutating (§4.8), so this entity action is
    // confirmation-gated too.
    let preview = router.clone().oneshot(get("/widget_abc123/echo")).await.unwrap();
    let preview = body_json(preview).await;
    let execute = preview["confirm"]["execute"].as_str().unwrap().to_string();

    let executed = router.oneshot(get(&execute)).await.unwrap();
    assert_eq!(executed.status(), StatusCode::OK);
    let executed = body_json(executed).await;
    assert_eq!(executed["data"]["echo"], json!(["widget_abc123"]));
}

#[tokio::test]
async fn post_to_an_entity_action_bypasses_confirmation() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().function(std::sync::Arc::new(Echo)).build());

    // Same unconfirmed verb as the GET round trip above, but over POST:
    // §4.8 says POST/PUT/PATCH/DELETE bypass the confirmation gate
    // entirely, so this must execute on the first call with no preview.
    let executed = router.oneshot(Request::post("/widget_abc123/echo").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(executed.status(), StatusCode::OK);
    let executed = body_json(executed).await;
    assert_eq!(executed["data"]["echo"], json!(["widget_abc123"]));
}

#[tokio::test]
async fn url_rpc_and_mcp_dispatch_the_same_function_identically() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().function(std::sync::Arc::new(Echo)).build());

    let via_url = router.clone().oneshot(get("/echo(hi)")).await.unwrap();
    assert_eq!(via_url.status(), StatusCode::OK);
    let via_url = body_json(via_url).await;

    let via_rpc = router
        .clone()
        .oneshot(post("/rpc", json!({ "path": ["echo"], "args": ["hi"] })))
        .await
        .unwrap();
    assert_eq!(via_rpc.status(), StatusCode::OK);
    let via_rpc = body_json(via_rpc).await;

    assert_eq!(via_url["data"], via_rpc["data"]);
    assert_eq!(via_url["data"], json!({ "echo": ["hi"] }));

    let via_mcp = router
        .oneshot(post(
            "/mcp",
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": { "name": "echo", "arguments": ["hi"] } }),
        ))
        .await
        .unwrap();
    assert_eq!(via_mcp.status(), StatusCode::OK);
    let via_mcp = body_json(via_mcp).await;
    let text = via_mcp["mcp"]["result"]["content"][0]["text"].as_str().unwrap();
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed, via_url["data"]);
}

#[tokio::test]
async fn mcp_tools_list_reflects_registered_functions() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().function(std::sync::Arc::new(Echo)).build());
    let response = router
        .oneshot(post("/mcp", json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" })))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["mcp"]["result"]["tools"][0]["name"], "echo");
}

#[tokio::test]
async fn default_tenant_is_used_when_nothing_else_resolves_it() {
    let db = std::sync::Arc::new(RecordingDb::default());
    let router = router_with(db.clone(), GatewayRegistry::builder().build());
    let response = router.oneshot(get("/widgets")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.last_tenant.lock().unwrap().as_deref(), Some("default"));
}

#[tokio::test]
async fn header_tenant_outranks_the_default() {
    let db = std::sync::Arc::new(RecordingDb::default());
    let router = router_with(db.clone(), GatewayRegistry::builder().build());
    let mut request = get("/widgets");
    request.headers_mut().insert("x-tenant", "beta".parse().unwrap());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.last_tenant.lock().unwrap().as_deref(), Some("beta"));
}

#[tokio::test]
async fn path_tenant_prefix_is_stripped_before_routing() {
    let db = std::sync::Arc::new(RecordingDb::default());
    let router = router_with(db.clone(), GatewayRegistry::builder().build());
    let response = router.oneshot(get("/~acme/widgets")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["widgets"]["total"], 0);
    assert_eq!(db.last_tenant.lock().unwrap().as_deref(), Some("acme"));
}

#[tokio::test]
async fn unclassifiable_deep_path_is_not_found_without_a_proxy_configured() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());
    let response = router.oneshot(get("/v1/accounts/123/invoices")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proxy_convention_rejects_a_path_outside_its_allow_list() {
    let mut config = GatewayConfig::default();
    config.confirm.secret = "test-secret".to_string();
    config.conventions.proxy = true;
    let deps = Dependencies {
        proxy: Some(gateway_conventions::proxy::ProxyConfig {
            base_url: "http://upstream.invalid".to_string(),
            allowed_prefixes: vec!["/v1/".to_string()],
        }),
        ..Dependencies::default()
    };
    let router = build_router(AppState::new(config, deps));

    // Three path segments don't classify as anything the self-describing
    // router owns, so this falls through to the proxy convention, whose
    // own allow-list check runs before any network call is made.
    let response = router.oneshot(get("/v2/accounts/123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "PATH_NOT_ALLOWED");
}

#[tokio::test]
async fn qa_surface_is_reachable_over_get_and_post() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());
    let via_get = router.clone().oneshot(get("/qa?method=tests/list")).await.unwrap();
    assert_eq!(via_get.status(), StatusCode::OK);

    let via_post = router.oneshot(post("/qa", json!({ "method": "tests/list" }))).await.unwrap();
    assert_eq!(via_post.status(), StatusCode::OK);
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());
    let response = router.oneshot(get("/me")).await.unwrap();
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn every_response_carries_rate_limit_headers() {
    let router = router_with(std::sync::Arc::new(RecordingDb::default()), GatewayRegistry::builder().build());
    let response = router.oneshot(get("/me")).await.unwrap();
    assert!(response.headers().get("x-ratelimit-limit").is_some());
    assert!(response.headers().get("x-ratelimit-remaining").is_some());
    assert!(response.headers().get("x-ratelimit-reset").is_some());
}

#[tokio::test]
async fn rate_limited_request_gets_a_retry_after_header() {
    let mut config = GatewayConfig::default();
    config.confirm.secret = "test-secret".to_string();
    let deps = Dependencies {
        rate_limiter: std::sync::Arc::new(gateway_runtime::WindowRateLimiter::new(0, 60)),
        ..Dependencies::default()
    };
    let router = build_router(AppState::new(config, deps));
    let response = router.oneshot(get("/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());
}
