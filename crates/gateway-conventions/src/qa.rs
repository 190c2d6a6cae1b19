//! The `/qa` test-observability surface (§4.19): `tests/list`,
//! `examples/list`, `schemas/list`, `tests/run` as JSON-RPC-shaped
//! methods over the same dispatch machinery `/rpc` uses. Read-only:
//! nothing here mutates gateway state.

use gateway_core::GatewayError;
use serde_json::{json, Value};

/// A named test case this gateway deployment knows about.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// The test's fully-qualified name, e.g. `"gateway_core::router::classifies_entity"`.
    pub name: String,
    /// One-line description of what it asserts.
    pub description: String,
}

/// A worked usage example surfaced for discovery (e.g. from `$schema` or a
/// convention's own doc comments).
#[derive(Debug, Clone)]
pub struct Example {
    /// What this example demonstrates.
    pub name: String,
    /// The request it issues, rendered as a string (method + path, or an
    /// RPC body).
    pub request: String,
    /// The response it expects, as a JSON value.
    pub response: Value,
}

/// A registered model schema, as reported by `schemas/list`.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    /// The model's name.
    pub model: String,
    /// Its JSON Schema.
    pub schema: Value,
}

/// The read-only fixtures `/qa` reflects: known test names, worked
/// examples, and model schemas. Populated once at boot from whatever the
/// gateway's conventions register.
#[derive(Debug, Clone, Default)]
pub struct QaFixtures {
    /// Known test cases.
    pub tests: Vec<TestCase>,
    /// Worked usage examples.
    pub examples: Vec<Example>,
    /// Registered model schemas.
    pub schemas: Vec<SchemaEntry>,
}

/// Dispatch a `/qa` JSON-RPC-shaped method.
///
/// # Errors
///
/// `METHOD_NOT_FOUND` for anything other than `tests/list`,
/// `examples/list`, `schemas/list`, `tests/run`.
pub fn handle_qa(fixtures: &QaFixtures, method: &str, params: &Value) -> Result<Value, GatewayError> {
    match method {
        "tests/list" => Ok(tests_list(fixtures)),
        "examples/list" => Ok(examples_list(fixtures)),
        "schemas/list" => Ok(schemas_list(fixtures)),
        "tests/run" => tests_run(fixtures, params),
        other => Err(GatewayError::method_not_found(format!("no /qa method named \"{other}\""))),
    }
}

fn tests_list(fixtures: &QaFixtures) -> Value {
    let tests: Vec<Value> = fixtures
        .tests
        .iter()
        .map(|t| json!({ "name": t.name, "description": t.description }))
        .collect();
    json!({ "tests": tests })
}

fn examples_list(fixtures: &QaFixtures) -> Value {
    let examples: Vec<Value> = fixtures
        .examples
        .iter()
        .map(|e| json!({ "name": e.name, "request": e.request, "response": e.response }))
        .collect();
    json!({ "examples": examples })
}

fn schemas_list(fixtures: &QaFixtures) -> Value {
    let schemas: Vec<Value> = fixtures
        .schemas
        .iter()
        .map(|s| json!({ "model": s.model, "schema": s.schema }))
        .collect();
    json!({ "schemas": schemas })
}

/// `tests/run` is read-only reflection: it reports whether the named
/// test is known, it never actually executes test code from a running
/// gateway process (that would require embedding the test binary, which
/// this surface deliberately does not do).
fn tests_run(fixtures: &QaFixtures, params: &Value) -> Result<Value, GatewayError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::bad_request("`tests/run` requires a `name` parameter"))?;
    let known = fixtures.tests.iter().any(|t| t.name == name);
    if known {
        Ok(json!({ "name": name, "status": "known", "executed": false }))
    } else {
        Err(GatewayError::not_found(format!("no test named \"{name}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> QaFixtures {
        QaFixtures {
            tests: vec![TestCase { name: "router::classifies_entity".into(), description: "entity classification".into() }],
            examples: vec![Example { name: "list contacts".into(), request: "GET /contacts".into(), response: json!([]) }],
            schemas: vec![SchemaEntry { model: "contact".into(), schema: json!({"type": "object"}) }],
        }
    }

    #[test]
    fn tests_list_reports_known_cases() {
        let value = handle_qa(&fixtures(), "tests/list", &Value::Null).unwrap();
        assert_eq!(value["tests"][0]["name"], "router::classifies_entity");
    }

    #[test]
    fn examples_list_reports_worked_examples() {
        let value = handle_qa(&fixtures(), "examples/list", &Value::Null).unwrap();
        assert_eq!(value["examples"][0]["request"], "GET /contacts");
    }

    #[test]
    fn schemas_list_reports_registered_models() {
        let value = handle_qa(&fixtures(), "schemas/list", &Value::Null).unwrap();
        assert_eq!(value["schemas"][0]["model"], "contact");
    }

    #[test]
    fn tests_run_reports_known_test() {
        let value = handle_qa(&fixtures(), "tests/run", &json!({"name": "router::classifies_entity"})).unwrap();
        assert_eq!(value["status"], "known");
    }

    #[test]
    fn tests_run_unknown_test_is_not_found() {
        let err = handle_qa(&fixtures(), "tests/run", &json!({"name": "bogus"})).unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::NotFound);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let err = handle_qa(&fixtures(), "bogus/method", &Value::Null).unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::MethodNotFound);
    }
}
