//! The single dispatch path every transport funnels through.

use gateway_core::GatewayError;
use gateway_runtime::GatewayContext;
use serde_json::Value;

use crate::registry::GatewayRegistry;

/// Look up `name` in `registry` and invoke it with `args`.
///
/// This is the one place a function call actually happens. The URL
/// function-call route, the `/rpc` JSON-RPC handler, and the `/mcp`
/// `tools/call` handler all resolve their arguments into the same `(name,
/// args)` shape and then call this — so a client gets byte-identical
/// results (modulo the outer transport envelope) no matter which surface
/// it used.
///
/// # Errors
///
/// Returns [`GatewayError::function_not_found`] if no function is
/// registered under `name`, or whatever the function itself returns.
pub async fn dispatch_call(
    registry: &GatewayRegistry,
    name: &str,
    args: Value,
    ctx: &GatewayContext,
) -> Result<Value, GatewayError> {
    let function = registry
        .get(name)
        .ok_or_else(|| GatewayError::function_not_found(format!("no function named \"{name}\"")))?;
    function.call(args, ctx).await
}
