//! Transport-equivalent function dispatch over `/rpc` and `/mcp` (§4.10,
//! §6). Both endpoints resolve down to the same
//! [`gateway_registry::dispatch_call`] call a URL function-call route
//! would use; only the request/response envelope differs.

use gateway_core::{pluralize, GatewayError};
use gateway_registry::{dispatch_call, GatewayRegistry};
use gateway_runtime::GatewayContext;
use serde::Deserialize;
use serde_json::{json, Value};

/// `POST /rpc` request body: `{"path": ["name"], "args": [...]}`.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    path: Vec<String>,
    #[serde(default)]
    args: Vec<Value>,
}

/// Synthesize the `{collection}.list|get|create|update|delete` entries the
/// database/CRUD convention auto-generates for every schema'd model
/// (§4.10), as `(name, description, schema)` triples so both `/rpc` and
/// MCP's `tools/list` can format them into their own wire shape. `models`
/// is the list of model names a schema is registered for, singular
/// (`"contact"`, not `"contacts"`).
fn crud_method_entries(models: &[String]) -> Vec<(String, String, Value)> {
    models
        .iter()
        .flat_map(|model| {
            let collection = pluralize(model);
            let id_schema = json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]});
            [
                ("list", format!("List {collection}"), json!({"type": "object", "properties": {"filter": {"type": "object"}, "sort": {"type": "string"}, "limit": {"type": "number"}, "offset": {"type": "number"}}})),
                ("get", format!("Get a {model} by id"), id_schema.clone()),
                ("create", format!("Create a {model}"), json!({"type": "object"})),
                ("update", format!("Update a {model} by id"), json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]})),
                ("delete", format!("Delete a {model} by id"), id_schema),
            ]
            .into_iter()
            .map(move |(verb, description, schema)| (format!("{collection}.{verb}"), description, schema))
        })
        .collect()
}

/// `GET /rpc`: `{"methods": [{name, description, parametersSchema}]}` —
/// every registered [`GatewayFunction`](gateway_registry::GatewayFunction)
/// plus the CRUD methods auto-generated for `models` (§4.10).
#[must_use]
pub fn list_methods(registry: &GatewayRegistry, models: &[String]) -> Value {
    let mut methods: Vec<Value> = registry
        .iter()
        .map(|f| {
            json!({
                "name": f.name(),
                "description": f.description(),
                "parametersSchema": f.parameters_schema(),
            })
        })
        .collect();
    methods.extend(
        crud_method_entries(models)
            .into_iter()
            .map(|(name, description, schema)| json!({ "name": name, "description": description, "parametersSchema": schema })),
    );
    json!({ "methods": methods })
}

/// `POST /rpc`: execute one registry entry named by `body.path[0]`,
/// called with `body.args` as a positional JSON array.
///
/// # Errors
///
/// `INVALID_RPC_REQUEST` if `body` doesn't parse or `path` is empty;
/// otherwise whatever [`dispatch_call`] raises (`FUNCTION_NOT_FOUND`,
/// `FUNCTION_ERROR`, ...).
pub async fn handle_rpc_call(registry: &GatewayRegistry, body: Value, ctx: &GatewayContext) -> Result<Value, GatewayError> {
    let request: RpcRequest = serde_json::from_value(body)
        .map_err(|e| GatewayError::invalid_rpc_request(format!("malformed RPC body: {e}")))?;
    let Some(name) = request.path.first() else {
        return Err(GatewayError::invalid_rpc_request("`path` must name at least one function"));
    };
    let args = Value::Array(request.args);
    dispatch_call(registry, name, args, ctx)
        .await
        .map(|data| json!({ "data": data }))
        .map_err(|e| match e.code {
            gateway_core::ErrorCode::FunctionNotFound => e,
            _ => GatewayError::function_error(e.message),
        })
}

/// One incoming MCP JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
struct McpRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Handle a single `POST /mcp` JSON-RPC request, returning a full JSON-RPC
/// 2.0 response envelope (`{jsonrpc, id, result}` or `{jsonrpc, id,
/// error}`) — MCP errors are reported inside the JSON-RPC body, never as
/// an HTTP error status, so this never returns `Err`.
pub async fn handle_mcp(registry: &GatewayRegistry, models: &[String], body: Value, ctx: &GatewayContext) -> Value {
    let request: McpRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => return mcp_error(Value::Null, -32700, &format!("parse error: {e}")),
    };
    let id = request.id.clone();
    match request.method.as_str() {
        "initialize" => mcp_result(id, mcp_initialize_result()),
        "tools/list" => mcp_result(id, mcp_tools_list(registry, models)),
        "tools/call" => match mcp_tools_call(registry, &request.params, ctx).await {
            Ok(result) => mcp_result(id, result),
            Err(err) => mcp_error(id, -32000, &err.message),
        },
        // The core exposes no addressable resources (§4.10 only specifies
        // tools); advertise an empty list rather than omitting the method.
        "resources/list" => mcp_result(id, json!({ "resources": [] })),
        "resources/read" => mcp_error(id, -32002, "no resources are registered"),
        other => mcp_error(id, -32601, &format!("unknown MCP method \"{other}\"")),
    }
}

fn mcp_initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {} },
        "serverInfo": { "name": "gateway", "version": env!("CARGO_PKG_VERSION") },
    })
}

fn mcp_tools_list(registry: &GatewayRegistry, models: &[String]) -> Value {
    let mut tools: Vec<Value> = registry
        .iter()
        .map(|f| {
            json!({
                "name": f.name(),
                "description": f.description(),
                "inputSchema": f.parameters_schema(),
            })
        })
        .collect();
    tools.extend(
        crud_method_entries(models)
            .into_iter()
            .map(|(name, description, schema)| json!({ "name": name, "description": description, "inputSchema": schema })),
    );
    json!({ "tools": tools })
}

async fn mcp_tools_call(registry: &GatewayRegistry, params: &Value, ctx: &GatewayContext) -> Result<Value, GatewayError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::invalid_rpc_request("`tools/call` params require a `name`"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
    let result = dispatch_call(registry, name, arguments, ctx).await?;
    let text = serde_json::to_string(&result).unwrap_or_default();
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

fn mcp_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn mcp_error(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}
