//! The single handler every request funnels through — the pipeline from
//! §2 laid out end to end: tenant/auth resolution, rate limiting, routing
//! (§4.3), the mutation confirmation gate (§4.8), convention dispatch,
//! envelope assembly (§4.11), and response-mode rendering (§4.12).
//!
//! Named routes (`/rpc`, `/mcp`, `/qa`, `/me`, `/events`, curated
//! categories) are recognized by their classified [`RouteKind`] rather
//! than mounted as separate Axum routes — the self-describing router
//! already parses the whole path, including any `/~tenant` prefix, so a
//! second, Axum-native routing tree would just duplicate that work and
//! risk disagreeing with it.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use gateway_core::{
    classify, parse_filters, ArgValue, ConfirmParams, Envelope, GatewayError, MetaTarget, ParsedFunctionCall, RouteKind, SortSpec,
};
use gateway_registry::dispatch_call;
use gateway_runtime::middleware::{build_preview_hash, require_confirm, requires_confirmation};
use gateway_runtime::{parse_respond_options, render_response, GatewayContext, RuntimeError};
use serde_json::{json, Map, Value};

use crate::state::AppState;

/// Entry point mounted as the router's catch-all fallback.
pub async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    match dispatch_inner(&state, &method, &uri, &headers, &body).await {
        Ok(response) => response,
        Err(err) => RuntimeError::from(err).into_response(),
    }
}

async fn dispatch_inner(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, GatewayError> {
    let principal = state.gateway.auth.authenticate(headers).await?;

    let header_tenant = headers.get("x-tenant").and_then(|v| v.to_str().ok());
    let host = headers.get(http::header::HOST).and_then(|v| v.to_str().ok());
    let tenant = gateway_core::resolve_tenant(
        uri.path(),
        header_tenant,
        host,
        principal.as_ref().and_then(|p| p.org.as_deref()),
        &state.gateway.tenant_config,
    );

    let rate_key = format!("{}:{}", tenant.tenant, principal.as_ref().map_or("anon", |p| p.subject.as_str()));
    let rate_limit = state.gateway.rate_limiter.check(&rate_key).await?;

    let query = uri.query().unwrap_or("");
    let respond_opts = parse_respond_options(query);

    let ctx = GatewayContext {
        tenant: tenant.clone(),
        principal: principal.clone(),
        respond: respond_opts,
    };

    let target = uri.path_and_query().map(http::uri::PathAndQuery::as_str).unwrap_or_else(|| uri.path());
    let route = classify(target);

    let envelope = route_to_envelope(state, method, &route.kind, &ctx, query, body).await?;
    let mut response = render_response(&envelope, &respond_opts, None, None);
    insert_rate_limit_headers(&mut response, &rate_limit);
    Ok(response)
}

/// Attach `X-RateLimit-Limit`/`X-RateLimit-Remaining`/`X-RateLimit-Reset`
/// (§6) reporting the budget [`gateway_runtime::RateLimiter::check`]
/// reported for this request.
fn insert_rate_limit_headers(response: &mut Response, outcome: &gateway_runtime::RateLimitOutcome) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", outcome.limit.to_string()),
        ("x-ratelimit-remaining", outcome.remaining.to_string()),
        ("x-ratelimit-reset", outcome.reset.to_string()),
    ] {
        if let Ok(value) = axum::http::HeaderValue::from_str(&value) {
            headers.insert(axum::http::HeaderName::from_static(name), value);
        }
    }
}

/// Strip a resolved `/~tenant` path prefix back off, so a forwarded proxy
/// path matches `ProxyConfig::allowed_prefixes` the way it would if the
/// gateway were mounted at the upstream's own root.
fn strip_resolved_tenant_prefix<'a>(path_and_query: &'a str, tenant: &gateway_core::TenantResolution) -> &'a str {
    if tenant.source == gateway_core::TenantSource::Path {
        if let Some(rest) = path_and_query.strip_prefix(&format!("/~{}", tenant.tenant)) {
            return rest;
        }
    }
    path_and_query
}

async fn route_to_envelope(
    state: &AppState,
    method: &Method,
    kind: &RouteKind,
    ctx: &GatewayContext,
    query: &str,
    body: &Bytes,
) -> Result<Envelope, GatewayError> {
    match kind {
        RouteKind::Collection { collection } => handle_collection(state, method, collection, ctx, query, body).await,
        RouteKind::Entity { entity } => handle_entity(state, method, entity, ctx, body).await,
        RouteKind::CollectionAction { collection, action } => handle_collection_action(state, method, collection, action, ctx, query).await,
        RouteKind::EntityAction { entity, action } => handle_entity_action(state, method, entity, action, ctx).await,
        RouteKind::Meta { target, name } => handle_meta_route(state, target, name, ctx, query).await,
        RouteKind::FunctionCall { call } => handle_function_call(state, call, ctx).await,
        RouteKind::Search { query } => handle_search(state, ctx, query.as_deref()).await,
        RouteKind::Unknown { path } => handle_unknown(state, method, path, ctx, body).await,
    }
}

/// Anything the self-describing router couldn't classify — most often a
/// multi-segment path a REST-shaped upstream would own (`/v1/accounts/123/invoices`)
/// — falls through to the proxy convention when one is configured (§1's
/// pipeline lists `proxy` alongside `crud`/`functions`/`events`); otherwise
/// it's a genuine 404.
async fn handle_unknown(state: &AppState, method: &Method, path: &str, ctx: &GatewayContext, body: &Bytes) -> Result<Envelope, GatewayError> {
    if state.config.conventions.proxy {
        if let Some(proxy) = &state.proxy {
            let target = strip_resolved_tenant_prefix(path, &ctx.tenant);
            let (upstream_path, _) = target.split_once('?').unwrap_or((target, ""));
            let payload = if body.is_empty() {
                None
            } else {
                Some(serde_json::from_slice(body).map_err(|e| GatewayError::invalid_json(format!("malformed request body: {e}")))?)
            };
            let data = gateway_conventions::proxy::forward(&state.http_client, proxy.as_ref(), method.as_str(), upstream_path, payload).await?;
            return Ok(Envelope::new(api_block(state, "proxy")).with_semantic("data", data));
        }
    }
    Err(GatewayError::not_found(format!("no route matches \"{path}\"")))
}

fn api_block(state: &AppState, kind: &str) -> Value {
    json!({
        "name": "gateway",
        "type": kind,
        "version": env!("CARGO_PKG_VERSION"),
        "description": format!("{} convention", kind),
        "conventions": {
            "crud": state.config.conventions.crud,
            "events": state.config.conventions.events,
            "proxy": state.config.conventions.proxy,
            "qa": state.config.conventions.qa,
        },
    })
}

fn model_name(collection: &str) -> String {
    collection.strip_suffix('s').unwrap_or(collection).to_string()
}

async fn handle_collection(
    state: &AppState,
    method: &Method,
    collection: &str,
    ctx: &GatewayContext,
    query: &str,
    body: &Bytes,
) -> Result<Envelope, GatewayError> {
    match collection {
        "rpc" if *method == Method::GET => return Ok(rpc_list_envelope(state)),
        "rpc" if *method == Method::POST => return rpc_call_envelope(state, ctx, body).await,
        "rpc" => return Err(GatewayError::bad_request(format!("method {method} not supported on /rpc"))),
        "mcp" if *method == Method::POST => return mcp_envelope(state, ctx, body).await,
        "mcp" => return Err(GatewayError::bad_request(format!("method {method} not supported on /mcp"))),
        "qa" => return qa_envelope(state, method, query, body),
        "me" if *method == Method::GET => return Ok(me_envelope(ctx)),
        "me" => return Err(GatewayError::bad_request(format!("method {method} not supported on /me"))),
        "events" => return events_collection_envelope(state, ctx, query).await,
        "" => return Err(GatewayError::not_found("empty collection")),
        _ => {}
    }
    if state.config.events.categories.iter().any(|c| c == collection) {
        return events_category_envelope(state, ctx, collection).await;
    }
    if !state.config.conventions.crud {
        return Err(GatewayError::not_found(format!("collection \"{collection}\" is not available")));
    }

    let model = model_name(collection);
    match *method {
        Method::GET => {
            let filter = parse_filters(query);
            let sort = SortSpec::parse(sort_param(query).as_deref().unwrap_or(""));
            let limit = numeric_param(query, "limit").unwrap_or(25);
            let offset = numeric_param(query, "offset").unwrap_or(0);
            let data = state.database.list(&model, &ctx.tenant.tenant, &filter, &sort, limit, offset).await?;
            Ok(Envelope::new(api_block(state, "crud"))
                .with_semantic(collection.to_string(), data)
                .with_page_info(None, Some(limit), Some(offset), None, None))
        }
        Method::POST => {
            let payload = parse_json_body(body)?;
            let schema = schema_for(state, &model)?;
            let actor = ctx.principal.as_ref().map(|p| p.subject.as_str());
            let data = gateway_conventions::crud::create(&*state.database, schema, &ctx.tenant.tenant, payload, actor).await?;
            Ok(Envelope::new(api_block(state, "crud")).with_semantic(model.clone(), data))
        }
        _ => Err(GatewayError::bad_request(format!("method {method} not supported on a collection"))),
    }
}

async fn handle_entity(
    state: &AppState,
    method: &Method,
    entity: &gateway_core::Identifier,
    ctx: &GatewayContext,
    body: &Bytes,
) -> Result<Envelope, GatewayError> {
    if !state.config.conventions.crud {
        return Err(GatewayError::not_found(format!("no entity \"{}\"", entity.id)));
    }
    match *method {
        Method::GET => {
            let data = gateway_conventions::crud::get(&*state.database, &entity.type_name, &ctx.tenant.tenant, &entity.id).await?;
            Ok(Envelope::new(api_block(state, "crud"))
                .with_type(entity.type_name.clone())
                .with_id(entity.id.clone())
                .with_semantic(entity.type_name.clone(), data))
        }
        Method::PUT | Method::PATCH => {
            let payload = parse_json_body(body)?;
            let schema = schema_for(state, &entity.type_name)?;
            let actor = ctx.principal.as_ref().map(|p| p.subject.as_str());
            let data = gateway_conventions::crud::update(&*state.database, schema, &ctx.tenant.tenant, &entity.id, payload, actor).await?;
            Ok(Envelope::new(api_block(state, "crud")).with_semantic(entity.type_name.clone(), data))
        }
        Method::DELETE => {
            gateway_conventions::crud::delete(&*state.database, &entity.type_name, &ctx.tenant.tenant, &entity.id).await?;
            Ok(Envelope::new(api_block(state, "crud")).with_semantic(entity.type_name.clone(), json!({ "id": entity.id, "deleted": true })))
        }
        _ => Err(GatewayError::bad_request(format!("method {method} not supported on an entity"))),
    }
}

/// `GET /{collection}/{action}`, e.g. `/contacts/create?name=Alice`. Every
/// mutating action (the default set plus any lowercase verb not in the
/// known read-set) is confirmation-gated when called over `GET`; calling
/// the equivalent `POST`/`PUT`/`PATCH`/`DELETE` verb on the collection
/// bypasses the gate entirely (§4.8), so this branch only ever runs for
/// `GET`.
async fn handle_collection_action(
    state: &AppState,
    method: &Method,
    collection: &str,
    action: &str,
    ctx: &GatewayContext,
    query: &str,
) -> Result<Envelope, GatewayError> {
    if *method != Method::GET {
        return Err(GatewayError::bad_request(format!("method {method} not supported on a collection action")));
    }
    if !state.config.conventions.crud {
        return Err(GatewayError::not_found(format!("no action \"{action}\" on \"{collection}\"")));
    }
    let model = model_name(collection);
    let data = query_to_map(query);

    if requires_confirmation(action) {
        let given = data.get("confirm").cloned();
        let signing_data: BTreeMap<String, String> = data.iter().filter(|(k, _)| *k != "confirm").map(|(k, v)| (k.clone(), v.clone())).collect();
        let params = ConfirmParams {
            action,
            type_name: Some(&model),
            data: &signing_data,
            tenant: &ctx.tenant.tenant,
            user_id: ctx.principal.as_ref().map(|p| p.subject.as_str()),
        };

        if given.is_none() {
            let hash = build_preview_hash(&state.gateway.confirm_secret, &params)?;
            let self_url = format!("/{collection}/{action}?{query}");
            let execute = format!("{self_url}&confirm={hash}");
            let cancel = format!("/~{}/{collection}", ctx.tenant.tenant);
            return Ok(Envelope::new(api_block(state, "crud")).with_semantic(
                "confirm",
                json!({ "action": action, "type": model, "preview": signing_data, "execute": execute, "cancel": cancel }),
            ));
        }

        require_confirm(&state.gateway.confirm_secret, &params, given.as_deref())?;
    }

    if action == "create" {
        let mut payload = Map::new();
        for (k, v) in &data {
            if k != "confirm" {
                payload.insert(k.clone(), Value::String(v.clone()));
            }
        }
        let schema = schema_for(state, &model)?;
        let actor = ctx.principal.as_ref().map(|p| p.subject.as_str());
        let record = gateway_conventions::crud::create(&*state.database, schema, &ctx.tenant.tenant, payload, actor).await?;
        return Ok(Envelope::new(api_block(state, "crud")).with_semantic(model.clone(), record));
    }

    let args = Value::Array(data.iter().filter(|(k, _)| *k != "confirm").map(|(_, v)| Value::String(v.clone())).collect());
    let result = dispatch_call(&state.registry, action, args, ctx).await?;
    Ok(Envelope::new(api_block(state, "function")).with_semantic("data", result))
}

/// `GET /{id}/{verb}` and `POST /{id}/{verb}` (§4.14's "global
/// self-describing routes"), the entity-scoped counterpart to a
/// collection action. There is no bespoke per-domain verb table in the
/// core (§1 excludes individual domain integrations) — a verb is
/// dispatched through the same [`gateway_registry`] every `name(args)`
/// URL and `/rpc` call uses, with the entity id as its sole positional
/// argument, so an entity action is just a registry function under
/// another name. `POST` bypasses the confirmation gate entirely, per
/// §4.8; only `GET` goes through the two-phase preview/execute dance.
async fn handle_entity_action(
    state: &AppState,
    method: &Method,
    entity: &gateway_core::Identifier,
    action: &str,
    ctx: &GatewayContext,
) -> Result<Envelope, GatewayError> {
    if *method != Method::GET && *method != Method::POST {
        return Err(GatewayError::bad_request(format!("method {method} not supported on an entity action")));
    }
    if *method == Method::GET && requires_confirmation(action) {
        let mut signing_data = BTreeMap::new();
        signing_data.insert("id".to_string(), entity.id.clone());
        let params = ConfirmParams {
            action,
            type_name: Some(&entity.type_name),
            data: &signing_data,
            tenant: &ctx.tenant.tenant,
            user_id: ctx.principal.as_ref().map(|p| p.subject.as_str()),
        };
        let hash = build_preview_hash(&state.gateway.confirm_secret, &params)?;
        return Ok(Envelope::new(api_block(state, "function")).with_semantic(
            "confirm",
            json!({
                "action": action,
                "type": entity.type_name,
                "preview": signing_data,
                "execute": format!("/{}/{action}?confirm={hash}", entity.id),
                "cancel": format!("/{}", entity.id),
            }),
        ));
    }
    let args = Value::Array(vec![Value::String(entity.id.clone())]);
    let result = dispatch_call(&state.registry, action, args, ctx).await?;
    Ok(Envelope::new(api_block(state, "function")).with_type(entity.type_name.clone()).with_id(entity.id.clone()).with_semantic("data", result))
}

async fn handle_meta_route(
    state: &AppState,
    target: &MetaTarget,
    name: &str,
    ctx: &GatewayContext,
    query: &str,
) -> Result<Envelope, GatewayError> {
    let meta_ctx = gateway_conventions::meta::MetaContext {
        tenant: &ctx.tenant.tenant,
        query,
        database: &*state.database,
        events: &*state.events,
        type_registry: &state.type_registry,
        page_sizes: &state.config.meta.page_sizes,
        sortable_fields: &state.config.meta.sortable_fields,
    };
    let value = gateway_conventions::meta::handle_meta(target, name, &meta_ctx).await?;
    Ok(Envelope::new(api_block(state, "meta")).with_semantic("meta", value))
}

fn arg_to_value(arg: &ArgValue) -> Value {
    match arg {
        ArgValue::Url(s) | ArgValue::String(s) => Value::String(s.clone()),
        ArgValue::Number(n, _) => json!(n),
        ArgValue::Entity(id) => Value::String(id.id.clone()),
    }
}

async fn handle_function_call(state: &AppState, call: &ParsedFunctionCall, ctx: &GatewayContext) -> Result<Envelope, GatewayError> {
    let args: Vec<Value> = call.args.iter().map(arg_to_value).collect();
    let args_value = if call.kwargs.is_empty() {
        Value::Array(args)
    } else {
        let mut map = Map::new();
        map.insert("args".to_string(), Value::Array(args));
        let kwargs: Map<String, Value> = call.kwargs.iter().map(|(k, v)| (k.clone(), arg_to_value(v))).collect();
        map.insert("kwargs".to_string(), Value::Object(kwargs));
        Value::Object(map)
    };
    let result = dispatch_call(&state.registry, &call.name, args_value, ctx).await?;
    Ok(Envelope::new(api_block(state, "function")).with_semantic("data", result))
}

async fn handle_search(state: &AppState, ctx: &GatewayContext, q: Option<&str>) -> Result<Envelope, GatewayError> {
    let Some(q) = q else {
        return Ok(Envelope::new(api_block(state, "search")).with_semantic("results", json!({})));
    };
    if !state.config.conventions.crud || state.schemas.is_empty() {
        return Ok(Envelope::new(api_block(state, "search")).with_semantic("results", json!({})));
    }
    let mut results = Map::new();
    for model in state.schemas.keys() {
        let hits = state.database.search(model, &ctx.tenant.tenant, q).await?;
        results.insert(model.clone(), hits);
    }
    Ok(Envelope::new(api_block(state, "search")).with_semantic("results", Value::Object(results)))
}

fn rpc_list_envelope(state: &AppState) -> Envelope {
    let models: Vec<String> = state.schemas.keys().cloned().collect();
    let methods = gateway_conventions::functions::list_methods(&state.registry, &models);
    Envelope::new(api_block(state, "function")).with_semantic("methods", methods["methods"].clone())
}

async fn rpc_call_envelope(state: &AppState, ctx: &GatewayContext, body: &Bytes) -> Result<Envelope, GatewayError> {
    let payload = Value::Object(parse_json_body(body)?);
    let result = gateway_conventions::functions::handle_rpc_call(&state.registry, payload, ctx).await?;
    Ok(Envelope::new(api_block(state, "function")).with_semantic("data", result["data"].clone()))
}

async fn mcp_envelope(state: &AppState, ctx: &GatewayContext, body: &Bytes) -> Result<Envelope, GatewayError> {
    let models: Vec<String> = state.schemas.keys().cloned().collect();
    let payload = Value::Object(parse_json_body(body)?);
    let result = gateway_conventions::functions::handle_mcp(&state.registry, &models, payload, ctx).await;
    Ok(Envelope::new(api_block(state, "function")).with_semantic("mcp", result))
}

fn qa_envelope(state: &AppState, method: &Method, query: &str, body: &Bytes) -> Result<Envelope, GatewayError> {
    let (method_name, params) = if *method == Method::POST {
        let payload = parse_json_body(body)?;
        let method_name = payload
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::bad_request("`/qa` POST body requires a `method` field"))?
            .to_string();
        (method_name, payload.get("params").cloned().unwrap_or(Value::Null))
    } else {
        let map = query_to_map(query);
        let method_name = map.get("method").cloned().unwrap_or_else(|| "tests/list".to_string());
        let params: Value = map.get("name").map_or(Value::Null, |n| json!({ "name": n }));
        (method_name, params)
    };
    let value = gateway_conventions::qa::handle_qa(&state.qa_fixtures, &method_name, &params)?;
    Ok(Envelope::new(api_block(state, "qa")).with_semantic("qa", value))
}

fn me_envelope(ctx: &GatewayContext) -> Envelope {
    let user = ctx.principal.as_ref().map_or(json!({ "authenticated": false }), |p| {
        json!({ "authenticated": true, "subject": p.subject, "org": p.org })
    });
    Envelope::new(json!({ "name": "gateway", "type": "identity", "version": env!("CARGO_PKG_VERSION"), "description": "current principal" }))
        .with_user(user)
}

async fn events_collection_envelope(state: &AppState, ctx: &GatewayContext, query: &str) -> Result<Envelope, GatewayError> {
    let scope = gateway_conventions::events::resolve_scope(ctx.principal.as_ref(), state.config.events.auth_required)?;
    let map = query_to_map(query);
    if map.is_empty() {
        let since = map.get("since").cloned().or_else(|| state.config.events.default_since.clone());
        let value = gateway_conventions::events::discover(&*state.events, &state.events_cache, scope.as_deref(), since.as_deref()).await?;
        return Ok(Envelope::new(api_block(state, "events")).with_discover(value));
    }
    let filters_value = query_filters_as_value(&map);
    let value = gateway_conventions::events::query(&*state.events, &filters_value, scope.as_deref()).await?;
    Ok(Envelope::new(api_block(state, "events")).with_semantic("events", value["data"].clone()).with_meta(json!({ "facets": value["facets"] })))
}

async fn events_category_envelope(state: &AppState, ctx: &GatewayContext, category: &str) -> Result<Envelope, GatewayError> {
    let scope = gateway_conventions::events::resolve_scope(ctx.principal.as_ref(), false)?;
    let value = gateway_conventions::events::browse_category(&*state.events, category, scope.as_deref()).await?;
    Ok(Envelope::new(api_block(state, "events")).with_semantic(category.to_string(), value))
}

fn schema_for<'a>(state: &'a AppState, model: &str) -> Result<&'a gateway_conventions::crud::ModelSchema, GatewayError> {
    state
        .schemas
        .get(model)
        .ok_or_else(|| GatewayError::not_found(format!("no schema registered for model \"{model}\"")))
}

fn parse_json_body(body: &Bytes) -> Result<Map<String, Value>, GatewayError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| GatewayError::invalid_json(format!("malformed request body: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(GatewayError::invalid_json("request body must be a JSON object")),
    }
}

fn query_to_map(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Some((urlencoding_decode(k), urlencoding_decode(v)))
        })
        .collect()
}

fn urlencoding_decode(s: &str) -> String {
    s.replace('+', " ")
}

fn query_filters_as_value(map: &BTreeMap<String, String>) -> Value {
    let mut out = Map::new();
    for (k, v) in map {
        out.insert(k.clone(), Value::String(v.clone()));
    }
    Value::Object(out)
}

fn numeric_param(query: &str, key: &str) -> Option<u64> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.parse().ok()).flatten()
    })
}

fn sort_param(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == "sort").then(|| v.to_string())
    })
}

