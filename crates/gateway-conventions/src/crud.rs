//! The CRUD/database convention (§4.14): per-model REST generated from a
//! parsed schema, validation before any storage call, soft-delete via
//! `_deletedAt`, and meta-field injection/stripping.

use chrono::Utc;
use gateway_core::{FieldError, Filter, GatewayError, SortSpec};
use serde_json::{Map, Value};

use crate::bindings::DatabaseBinding;

/// The meta-fields the core injects on write and strips from user input.
/// A client can read them back on a record but can never set them.
pub const META_FIELDS: &[&str] = &[
    "_version",
    "_createdAt",
    "_createdBy",
    "_updatedAt",
    "_updatedBy",
    "_deletedAt",
    "_deletedBy",
];

/// A single field's validation rule.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Whether the field must be present on create.
    pub required: bool,
    /// Expected JSON Schema-ish type name (`"string"`, `"number"`, `"boolean"`, `"any"`).
    pub kind: String,
}

/// A model's validation schema: an ordered list of field rules.
#[derive(Debug, Clone, Default)]
pub struct ModelSchema {
    /// The model name this schema describes.
    pub model: String,
    /// Field rules, in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl ModelSchema {
    /// Validate `data` against this schema, collecting every failure
    /// rather than stopping at the first (so a client sees every problem
    /// in one round trip).
    #[must_use]
    pub fn validate(&self, data: &Map<String, Value>) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for field in &self.fields {
            let value = data.get(&field.name);
            match value {
                None | Some(Value::Null) => {
                    if field.required {
                        errors.push(FieldError {
                            field: field.name.clone(),
                            message: "is required".to_string(),
                            expected: field.kind.clone(),
                            received: "missing".to_string(),
                        });
                    }
                }
                Some(v) => {
                    if !type_matches(&field.kind, v) {
                        errors.push(FieldError {
                            field: field.name.clone(),
                            message: format!("expected {}", field.kind),
                            expected: field.kind.clone(),
                            received: type_name(v).to_string(),
                        });
                    }
                }
            }
        }
        errors
    }
}

fn type_matches(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strip any client-supplied meta-fields from `data` in place — they are
/// server-controlled and never accepted from user input.
pub fn strip_meta_fields(data: &mut Map<String, Value>) {
    for key in META_FIELDS {
        data.remove(*key);
    }
}

/// Inject creation meta-fields: `_version: 1`, `_createdAt`/`_updatedAt`
/// (both now), `_createdBy`/`_updatedBy` (the acting principal, if any).
pub fn inject_create_meta(data: &mut Map<String, Value>, actor: Option<&str>) {
    let now = Value::String(Utc::now().to_rfc3339());
    data.insert("_version".to_string(), Value::from(1));
    data.insert("_createdAt".to_string(), now.clone());
    data.insert("_updatedAt".to_string(), now);
    if let Some(actor) = actor {
        data.insert("_createdBy".to_string(), Value::String(actor.to_string()));
        data.insert("_updatedBy".to_string(), Value::String(actor.to_string()));
    }
}

/// Bump update meta-fields: `_updatedAt` (now), `_updatedBy` (the acting
/// principal, if any); `_version` increments from `previous_version`.
pub fn inject_update_meta(data: &mut Map<String, Value>, previous_version: Option<i64>, actor: Option<&str>) {
    data.insert("_version".to_string(), Value::from(previous_version.unwrap_or(0) + 1));
    data.insert("_updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
    if let Some(actor) = actor {
        data.insert("_updatedBy".to_string(), Value::String(actor.to_string()));
    }
}

/// List records, paginated and filtered, via `?field[$op]=value`/`?sort=`/
/// `?limit=`/`?offset=`.
///
/// # Errors
///
/// Whatever the [`DatabaseBinding`] raises.
pub async fn list(
    database: &dyn DatabaseBinding,
    model: &str,
    tenant: &str,
    query: &str,
) -> Result<Value, GatewayError> {
    let filter = gateway_core::parse_filters(query);
    let sort = SortSpec::parse(sort_param(query).unwrap_or_default().as_str());
    let limit = numeric_param(query, "limit").unwrap_or(25);
    let offset = numeric_param(query, "offset").unwrap_or(0);
    database.list(model, tenant, &filter, &sort, limit, offset).await
}

/// Fetch a single record by id.
///
/// # Errors
///
/// `NOT_FOUND` if no matching, non-deleted record exists.
pub async fn get(database: &dyn DatabaseBinding, model: &str, tenant: &str, id: &str) -> Result<Value, GatewayError> {
    database
        .get(model, tenant, id)
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no {model} with id \"{id}\"")))
}

/// Validate and create a new record.
///
/// # Errors
///
/// `VALIDATION_ERROR` if `data` fails `schema`; otherwise whatever the
/// binding raises.
pub async fn create(
    database: &dyn DatabaseBinding,
    schema: &ModelSchema,
    tenant: &str,
    mut data: Map<String, Value>,
    actor: Option<&str>,
) -> Result<Value, GatewayError> {
    strip_meta_fields(&mut data);
    let errors = schema.validate(&data);
    if !errors.is_empty() {
        return Err(GatewayError::validation_error(errors));
    }
    inject_create_meta(&mut data, actor);
    database.create(&schema.model, tenant, Value::Object(data)).await
}

/// Validate and apply a partial update.
///
/// # Errors
///
/// `VALIDATION_ERROR` on schema mismatch, `NOT_FOUND` if the record
/// doesn't exist, otherwise whatever the binding raises.
pub async fn update(
    database: &dyn DatabaseBinding,
    schema: &ModelSchema,
    tenant: &str,
    id: &str,
    mut data: Map<String, Value>,
    actor: Option<&str>,
) -> Result<Value, GatewayError> {
    strip_meta_fields(&mut data);
    let errors = schema.validate(&data);
    if !errors.is_empty() {
        return Err(GatewayError::validation_error(errors));
    }
    let existing = database
        .get(&schema.model, tenant, id)
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no {} with id \"{id}\"", schema.model)))?;
    let previous_version = existing.get("_version").and_then(Value::as_i64);
    inject_update_meta(&mut data, previous_version, actor);
    database
        .update(&schema.model, tenant, id, Value::Object(data))
        .await?
        .ok_or_else(|| GatewayError::not_found(format!("no {} with id \"{id}\"", schema.model)))
}

/// Soft-delete a record (the binding is responsible for setting
/// `_deletedAt`/`_deletedBy`; this just reports whether one existed).
///
/// # Errors
///
/// `NOT_FOUND` if no matching record existed.
pub async fn delete(database: &dyn DatabaseBinding, model: &str, tenant: &str, id: &str) -> Result<(), GatewayError> {
    let deleted = database.delete(model, tenant, id).await?;
    if deleted {
        Ok(())
    } else {
        Err(GatewayError::not_found(format!("no {model} with id \"{id}\"")))
    }
}

/// `/{plural}/$count`.
///
/// # Errors
///
/// Whatever the binding raises.
pub async fn count(database: &dyn DatabaseBinding, model: &str, tenant: &str, query: &str) -> Result<u64, GatewayError> {
    let filter = gateway_core::parse_filters(query);
    database.count(model, tenant, &filter).await
}

/// `/{plural}/search?q=…`.
///
/// # Errors
///
/// Whatever the binding raises.
pub async fn search(database: &dyn DatabaseBinding, model: &str, tenant: &str, q: &str) -> Result<Value, GatewayError> {
    database.search(model, tenant, q).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct InMemoryDb {
        records: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl DatabaseBinding for InMemoryDb {
        async fn create(&self, _model: &str, _tenant: &str, data: Value) -> Result<Value, GatewayError> {
            self.records.lock().unwrap().push(data.clone());
            Ok(data)
        }
        async fn get(&self, _model: &str, _tenant: &str, id: &str) -> Result<Option<Value>, GatewayError> {
            Ok(self.records.lock().unwrap().iter().find(|r| r["id"] == id).cloned())
        }
        async fn update(&self, _model: &str, _tenant: &str, id: &str, data: Value) -> Result<Option<Value>, GatewayError> {
            let mut records = self.records.lock().unwrap();
            if let Some(r) = records.iter_mut().find(|r| r["id"] == id) {
                for (k, v) in data.as_object().unwrap() {
                    r[k] = v.clone();
                }
                return Ok(Some(r.clone()));
            }
            Ok(None)
        }
        async fn delete(&self, _model: &str, _tenant: &str, id: &str) -> Result<bool, GatewayError> {
            let mut records = self.records.lock().unwrap();
            let existed = records.iter().any(|r| r["id"] == id);
            records.retain(|r| r["id"] != id);
            Ok(existed)
        }
        async fn list(
            &self,
            _model: &str,
            _tenant: &str,
            _filter: &Filter,
            _sort: &SortSpec,
            _limit: u64,
            _offset: u64,
        ) -> Result<Value, GatewayError> {
            Ok(Value::Array(self.records.lock().unwrap().clone()))
        }
        async fn search(&self, _model: &str, _tenant: &str, _query: &str) -> Result<Value, GatewayError> {
            Ok(json!([]))
        }
        async fn count(&self, _model: &str, _tenant: &str, _filter: &Filter) -> Result<u64, GatewayError> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
    }

    fn schema() -> ModelSchema {
        ModelSchema {
            model: "contact".to_string(),
            fields: vec![
                FieldSpec { name: "name".to_string(), required: true, kind: "string".to_string() },
                FieldSpec { name: "age".to_string(), required: false, kind: "number".to_string() },
            ],
        }
    }

    #[test]
    fn strip_meta_fields_removes_all_seven() {
        let mut data = Map::new();
        for field in META_FIELDS {
            data.insert((*field).to_string(), Value::from(1));
        }
        data.insert("name".to_string(), Value::from("Ada"));
        strip_meta_fields(&mut data);
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("name"));
    }

    #[test]
    fn validate_reports_missing_required_field() {
        let data = Map::new();
        let errors = schema().validate(&data);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn validate_reports_wrong_type() {
        let mut data = Map::new();
        data.insert("name".to_string(), Value::from("Ada"));
        data.insert("age".to_string(), Value::from("not a number"));
        let errors = schema().validate(&data);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "age");
    }

    #[tokio::test]
    async fn create_rejects_invalid_payload_before_storage() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let mut data = Map::new();
        data.insert("age".to_string(), Value::from(10));
        let err = create(&db, &schema(), "default", data, None).await.unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::ValidationError);
        assert!(db.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_injects_meta_fields_and_strips_client_supplied_ones() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from("contact_1"));
        data.insert("name".to_string(), Value::from("Ada"));
        data.insert("_version".to_string(), Value::from(999));
        let record = create(&db, &schema(), "default", data, Some("user_1")).await.unwrap();
        assert_eq!(record["_version"], 1);
        assert_eq!(record["_createdBy"], "user_1");
    }

    #[tokio::test]
    async fn update_bumps_version_from_existing_record() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from("contact_1"));
        data.insert("name".to_string(), Value::from("Ada"));
        create(&db, &schema(), "default", data, None).await.unwrap();

        let mut patch = Map::new();
        patch.insert("name".to_string(), Value::from("Ada Lovelace"));
        let updated = update(&db, &schema(), "default", "contact_1", patch, Some("user_2")).await.unwrap();
        assert_eq!(updated["_version"], 2);
        assert_eq!(updated["_updatedBy"], "user_2");
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let mut patch = Map::new();
        patch.insert("name".to_string(), Value::from("x"));
        let err = update(&db, &schema(), "default", "missing", patch, None).await.unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let err = delete(&db, "contact", "default", "missing").await.unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_existing_record_succeeds() {
        let db = InMemoryDb { records: Mutex::new(Vec::new()) };
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from("contact_1"));
        data.insert("name".to_string(), Value::from("Ada"));
        create(&db, &schema(), "default", data, None).await.unwrap();
        delete(&db, "contact", "default", "contact_1").await.unwrap();
    }
}
