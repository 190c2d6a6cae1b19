//! The meta-resource dispatch table (§4.9): `$pageSize`, `$sort`, `$count`,
//! `$schema`, `$pages`, `$facets`, `$history`, `$events`. Each reflects on
//! either a collection or a single entity (`router::MetaTarget`); an
//! unrecognized `$name` is a `NOT_FOUND`, not a silent fallthrough, so the
//! dispatch table is exhaustive by construction rather than by convention.

use gateway_core::{parse_filters, GatewayError, MetaTarget, TypeRegistry};
use serde_json::{json, Value};

use crate::bindings::{DatabaseBinding, EventsBinding};

/// Everything a meta-resource handler needs beyond the target/name pair.
pub struct MetaContext<'a> {
    /// The tenant the request resolved to.
    pub tenant: &'a str,
    /// Raw query string (no leading `?`), forwarded to `$count`/`$facets`.
    pub query: &'a str,
    /// The entity database, for `$count` and `$history`.
    pub database: &'a dyn DatabaseBinding,
    /// The events store, for `$facets` and `$events`.
    pub events: &'a dyn EventsBinding,
    /// The model↔number registry, for `$schema`.
    pub type_registry: &'a TypeRegistry,
    /// Offered `?limit=N` values, for `$pageSize`.
    pub page_sizes: &'a [u64],
    /// Offered sort fields, for `$sort`.
    pub sortable_fields: &'a [String],
}

/// Dispatch a `$name` meta-resource request against `target`.
///
/// # Errors
///
/// Returns `NOT_FOUND` for an unrecognized `$name`, and propagates any
/// error the underlying binding raises.
pub async fn handle_meta(target: &MetaTarget, name: &str, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    match name {
        "pageSize" => Ok(page_size_map(target, ctx)),
        "sort" => Ok(sort_map(target, ctx)),
        "count" => handle_count(target, ctx).await,
        "schema" => handle_schema(target, ctx),
        "pages" => handle_pages(target, ctx).await,
        "facets" => handle_facets(target, ctx).await,
        "history" => handle_history(target, ctx).await,
        "events" => handle_events(target, ctx).await,
        other => Err(GatewayError::not_found(format!("no meta-resource named \"${other}\""))),
    }
}

fn collection_name(target: &MetaTarget) -> String {
    match target {
        MetaTarget::Collection(name) => name.clone(),
        MetaTarget::Entity(id) => id.collection.clone(),
    }
}

fn model_name(target: &MetaTarget) -> String {
    match target {
        MetaTarget::Entity(id) => id.type_name.clone(),
        MetaTarget::Collection(name) => singularize_for_model(name),
    }
}

fn singularize_for_model(collection: &str) -> String {
    collection.strip_suffix('s').unwrap_or(collection).to_string()
}

/// `$pageSize`: a map of size → URL for `?limit=N` (§4.9), one entry per
/// configured page size.
fn page_size_map(target: &MetaTarget, ctx: &MetaContext<'_>) -> Value {
    let base = collection_url(target, ctx.tenant);
    let mut map = serde_json::Map::new();
    for size in ctx.page_sizes {
        map.insert(size.to_string(), Value::String(format!("{base}?limit={size}")));
    }
    Value::Object(map)
}

/// `$sort`: a map of `Label → URL` with `?sort=field`/`?sort=-field`
/// (§4.9), one ascending and one descending entry per configured sortable
/// field.
fn sort_map(target: &MetaTarget, ctx: &MetaContext<'_>) -> Value {
    let base = collection_url(target, ctx.tenant);
    let mut map = serde_json::Map::new();
    for field in ctx.sortable_fields {
        map.insert(field.clone(), Value::String(format!("{base}?sort={field}")));
        map.insert(format!("-{field}"), Value::String(format!("{base}?sort=-{field}")));
    }
    Value::Object(map)
}

fn collection_url(target: &MetaTarget, tenant: &str) -> String {
    format!("/~{tenant}/{}", collection_name(target))
}

async fn handle_count(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let model = model_name(target);
    let filter = parse_filters(ctx.query);
    let count = ctx.database.count(&model, ctx.tenant, &filter).await?;
    Ok(json!({ "count": count }))
}

fn handle_schema(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let model = model_name(target);
    let number = ctx.type_registry.number_of(&model);
    Ok(json!({
        "model": model,
        "typeNumber": number,
        "registryVersion": ctx.type_registry.version(),
    }))
}

async fn handle_pages(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let model = model_name(target);
    let filter = parse_filters(ctx.query);
    let limit = page_size_from_query(ctx.query);
    let total = ctx.database.count(&model, ctx.tenant, &filter).await?;
    let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
    Ok(json!({ "total": total, "limit": limit, "pages": pages }))
}

async fn handle_facets(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let dimension = query_param(ctx.query, "dimension")
        .ok_or_else(|| GatewayError::bad_request("`$facets` requires a `dimension` query parameter"))?;
    let scope = collection_name(target);
    ctx.events.facets(&dimension, &Value::Null, Some(&scope)).await
}

async fn handle_history(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let MetaTarget::Entity(id) = target else {
        return Err(GatewayError::bad_request("`$history` applies to a single entity, not a collection"));
    };
    let record = ctx
        .database
        .get(&id.type_name, ctx.tenant, &id.id)
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no {} with id \"{}\"", id.type_name, id.id)))?;
    Ok(json!({ "id": id.id, "current": record, "revisions": [] }))
}

async fn handle_events(target: &MetaTarget, ctx: &MetaContext<'_>) -> Result<Value, GatewayError> {
    let MetaTarget::Entity(id) = target else {
        return Err(GatewayError::bad_request("`$events` applies to a single entity, not a collection"));
    };
    let filters = json!({ "entityId": id.id });
    ctx.events.search(&filters, Some(&id.collection)).await
}

fn page_size_from_query(query: &str) -> u64 {
    query_param(query, "limit").and_then(|v| v.parse().ok()).unwrap_or(25)
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}
