//! The function registry: a name-keyed map of [`GatewayFunction`]s, built
//! once at startup and shared across transports.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::function::GatewayFunction;

/// An immutable, name-keyed table of callable functions.
///
/// Built via [`RegistryBuilder`] and then shared (cheaply, behind an
/// `Arc`) across the URL router, the `/rpc` handler, and the `/mcp`
/// handler — the same table backs all three transports, which is what
/// makes their dispatch provably equivalent.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    functions: BTreeMap<String, Arc<dyn GatewayFunction>>,
}

impl GatewayRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn GatewayFunction>> {
        self.functions.get(name)
    }

    /// All registered functions, in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn GatewayFunction>> {
        self.functions.values()
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// `true` if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Builder for [`GatewayRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    functions: BTreeMap<String, Arc<dyn GatewayFunction>>,
}

impl RegistryBuilder {
    /// Register a function. Panics (at build time, via [`Self::build`]
    /// returning an error is deliberately not offered here — a name
    /// collision is a startup-time configuration bug, not a runtime
    /// condition) if the name is already registered.
    #[must_use]
    pub fn function(mut self, function: Arc<dyn GatewayFunction>) -> Self {
        let name = function.name().to_string();
        assert!(
            self.functions.insert(name.clone(), function).is_none(),
            "duplicate function registration: {name}"
        );
        self
    }

    /// Finish building the registry.
    #[must_use]
    pub fn build(self) -> GatewayRegistry {
        GatewayRegistry {
            functions: self.functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::GatewayError;
    use gateway_runtime::GatewayContext;
    use serde_json::Value;

    struct Noop(&'static str);

    #[async_trait]
    impl GatewayFunction for Noop {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "noop"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn call(&self, _args: Value, _ctx: &GatewayContext) -> Result<Value, GatewayError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn builds_and_looks_up() {
        let registry = GatewayRegistry::builder()
            .function(Arc::new(Noop("score")))
            .function(Arc::new(Noop("notify")))
            .build();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("score").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate function registration")]
    fn rejects_duplicate_names() {
        let _ = GatewayRegistry::builder()
            .function(Arc::new(Noop("score")))
            .function(Arc::new(Noop("score")));
    }

    #[test]
    fn empty_registry_reports_empty() {
        let registry = GatewayRegistry::builder().build();
        assert!(registry.is_empty());
    }
}
