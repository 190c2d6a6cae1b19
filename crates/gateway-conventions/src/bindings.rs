//! External collaborator contracts (§6): the events store, the entity
//! database, and the handful of pluggable services a convention consumes
//! without owning. Each is an `async_trait` so a mock, an in-memory
//! fixture, or a real backing store can be swapped in without touching
//! the convention that calls it.

use async_trait::async_trait;
use gateway_core::GatewayError;
use serde_json::Value;

/// The four operations the events convention (§4.13) needs from whatever
/// actually stores events (ClickHouse, a log pipeline, ...).
#[async_trait]
pub trait EventsBinding: Send + Sync {
    /// `search(filters, scope?) -> {data, total, limit, offset, hasMore}`.
    async fn search(&self, filters: &Value, scope: Option<&str>) -> Result<Value, GatewayError>;

    /// `facets({dimension, filters}, scope?) -> {facets: [{value, count}], total}`.
    async fn facets(&self, dimension: &str, filters: &Value, scope: Option<&str>) -> Result<Value, GatewayError>;

    /// `count({filters, groupBy?}, scope?) -> {count, groups?}`.
    async fn count(&self, filters: &Value, group_by: Option<&str>, scope: Option<&str>) -> Result<Value, GatewayError>;

    /// `sql(query, params?) -> {data, rows, elapsed}`.
    async fn sql(&self, query: &str, params: &Value) -> Result<Value, GatewayError>;
}

/// The CRUD operations the database convention (§4.14) needs from
/// whatever actually persists entities.
#[async_trait]
pub trait DatabaseBinding: Send + Sync {
    /// Insert a new record of `model` and return it (with meta-fields
    /// populated).
    async fn create(&self, model: &str, tenant: &str, data: Value) -> Result<Value, GatewayError>;

    /// Fetch a single record by id, or `Ok(None)` if it doesn't exist (or
    /// is soft-deleted).
    async fn get(&self, model: &str, tenant: &str, id: &str) -> Result<Option<Value>, GatewayError>;

    /// Apply a partial update and return the updated record.
    async fn update(&self, model: &str, tenant: &str, id: &str, data: Value) -> Result<Option<Value>, GatewayError>;

    /// Soft-delete a record (sets `_deletedAt`); returns whether a record
    /// was found.
    async fn delete(&self, model: &str, tenant: &str, id: &str) -> Result<bool, GatewayError>;

    /// List records matching `filter`, sorted by `sort`, paginated by
    /// `limit`/`offset`. Returns `{data, total, hasMore}`.
    async fn list(
        &self,
        model: &str,
        tenant: &str,
        filter: &gateway_core::Filter,
        sort: &gateway_core::SortSpec,
        limit: u64,
        offset: u64,
    ) -> Result<Value, GatewayError>;

    /// Full-text search within `model`.
    async fn search(&self, model: &str, tenant: &str, query: &str) -> Result<Value, GatewayError>;

    /// Count records matching `filter`.
    async fn count(&self, model: &str, tenant: &str, filter: &gateway_core::Filter) -> Result<u64, GatewayError>;
}

/// A [`DatabaseBinding`] that reports every call as unconfigured; lets
/// the gateway boot (and its discovery/`$schema` surfaces respond) before
/// a real storage engine is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredDatabaseBinding;

#[async_trait]
impl DatabaseBinding for UnconfiguredDatabaseBinding {
    async fn create(&self, _model: &str, _tenant: &str, _data: Value) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn get(&self, _model: &str, _tenant: &str, _id: &str) -> Result<Option<Value>, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn update(&self, _model: &str, _tenant: &str, _id: &str, _data: Value) -> Result<Option<Value>, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn delete(&self, _model: &str, _tenant: &str, _id: &str) -> Result<bool, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn list(
        &self,
        _model: &str,
        _tenant: &str,
        _filter: &gateway_core::Filter,
        _sort: &gateway_core::SortSpec,
        _limit: u64,
        _offset: u64,
    ) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn search(&self, _model: &str, _tenant: &str, _query: &str) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }

    async fn count(&self, _model: &str, _tenant: &str, _filter: &gateway_core::Filter) -> Result<u64, GatewayError> {
        Err(GatewayError::internal("no database binding configured"))
    }
}

/// An [`EventsBinding`] that reports every call as unconfigured; the
/// events convention falls back to this when no real binding is wired,
/// rather than failing to construct at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredEventsBinding;

#[async_trait]
impl EventsBinding for UnconfiguredEventsBinding {
    async fn search(&self, _filters: &Value, _scope: Option<&str>) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no events binding configured"))
    }

    async fn facets(&self, _dimension: &str, _filters: &Value, _scope: Option<&str>) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no events binding configured"))
    }

    async fn count(&self, _filters: &Value, _group_by: Option<&str>, _scope: Option<&str>) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no events binding configured"))
    }

    async fn sql(&self, _query: &str, _params: &Value) -> Result<Value, GatewayError> {
        Err(GatewayError::internal("no events binding configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_binding_rejects_every_call() {
        let binding = UnconfiguredEventsBinding;
        assert!(binding.search(&Value::Null, None).await.is_err());
        assert!(binding.facets("type", &Value::Null, None).await.is_err());
        assert!(binding.count(&Value::Null, None, None).await.is_err());
        assert!(binding.sql("select 1", &Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn unconfigured_database_rejects_every_call() {
        let db = UnconfiguredDatabaseBinding;
        assert!(db.create("contact", "default", Value::Null).await.is_err());
        assert!(db.get("contact", "default", "contact_1").await.is_err());
        assert!(db.delete("contact", "default", "contact_1").await.is_err());
        assert!(db.count("contact", "default", &gateway_core::Filter::default()).await.is_err());
    }
}
