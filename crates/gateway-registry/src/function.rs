//! The callable-function contract.

use async_trait::async_trait;
use gateway_core::GatewayError;
use gateway_runtime::GatewayContext;
use serde_json::Value;

/// A named, callable gateway function — a single implementation reachable
/// identically from the URL function-call syntax (`score(contact_abc)`),
/// the JSON-RPC `/rpc` endpoint, and MCP `tools/call`.
///
/// Implementors describe their own name, human-readable description, and
/// JSON Schema for arguments so `$schema` meta-resources and MCP
/// `tools/list` can be generated from the same source the dispatcher
/// calls against — the schema can never drift from the behavior.
#[async_trait]
pub trait GatewayFunction: Send + Sync {
    /// The function's name, as it appears in `name(args)` URLs and RPC
    /// `method` fields.
    fn name(&self) -> &str;

    /// A one-line, human-readable description (surfaced in `$schema` and
    /// MCP `tools/list`).
    fn description(&self) -> &str;

    /// JSON Schema for this function's arguments object.
    fn parameters_schema(&self) -> Value;

    /// Invoke the function with already-assembled JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::validation_error`] if `args` doesn't match
    /// [`Self::parameters_schema`], or whatever the implementation's own
    /// failure mode maps to.
    async fn call(&self, args: Value, ctx: &GatewayContext) -> Result<Value, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl GatewayFunction for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "returns its input unchanged"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn call(&self, args: Value, _ctx: &GatewayContext) -> Result<Value, GatewayError> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn echo_returns_input() {
        let ctx = GatewayContext {
            tenant: gateway_core::TenantResolution {
                tenant: "default".into(),
                source: gateway_core::TenantSource::Default,
            },
            principal: None,
            respond: gateway_core::RespondOptions::default(),
        };
        let function = Echo;
        let result = function.call(serde_json::json!({"x": 1}), &ctx).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }
}
