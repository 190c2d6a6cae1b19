//! The events convention (§4.13): curated browsing over an external
//! events store, scoped by principal and cached for discovery requests.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use gateway_core::GatewayError;
use gateway_runtime::Principal;
use serde_json::{json, Value};

use crate::bindings::EventsBinding;

/// A forward cache for `GET /events` discovery responses (no filters),
/// keyed by `(scope, since)` and evicted after `ttl` (§4.13: 5 minutes by
/// default). Discovery is the expensive, frequently-repeated call
/// (facets + recent list); filtered queries always hit the binding.
pub struct DiscoveryCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Option<String>, Option<String>), (Instant, Value)>>,
}

impl DiscoveryCache {
    /// Build a cache with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &(Option<String>, Option<String>)) -> Option<Value> {
        let entries = self.entries.read().unwrap();
        let (inserted_at, value) = entries.get(key)?;
        if inserted_at.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    fn put(&self, key: (Option<String>, Option<String>), value: Value) {
        self.entries.write().unwrap().insert(key, (Instant::now(), value));
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Resolve the scope a principal's event queries are confined to (§4.13).
///
/// An anonymous principal is rejected when `auth_required`; an
/// authenticated principal with no `org` claim sees every event (treated
/// as a platform-level caller); one with an `org` claim is scoped to it.
///
/// # Errors
///
/// `UNAUTHORIZED` if `principal` is `None` and `auth_required` is set.
pub fn resolve_scope(principal: Option<&Principal>, auth_required: bool) -> Result<Option<String>, GatewayError> {
    match principal {
        None if auth_required => Err(GatewayError::unauthorized("events access requires authentication")),
        None => Ok(None),
        Some(p) => Ok(p.org.clone()),
    }
}

/// `GET /events` with no filters: faceted discovery by `type` plus a
/// recent-events list, cached for `cache.ttl`.
///
/// # Errors
///
/// Whatever the [`EventsBinding`] raises.
pub async fn discover(
    events: &dyn EventsBinding,
    cache: &DiscoveryCache,
    scope: Option<&str>,
    since: Option<&str>,
) -> Result<Value, GatewayError> {
    let key = (scope.map(str::to_string), since.map(str::to_string));
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let filters = since.map_or(Value::Null, |s| json!({ "since": s }));
    let facets = events.facets("type", &filters, scope).await?;
    let recent = events.search(&filters, scope).await?;
    let value = json!({ "facets": facets, "recent": recent });
    cache.put(key, value.clone());
    Ok(value)
}

/// `GET /events` with filters present, or `GET /events/:type`: actual
/// event data plus facets, never cached (filtered queries are cheap
/// relative to the unfiltered discovery scan, and the result set is
/// request-specific).
///
/// # Errors
///
/// Whatever the [`EventsBinding`] raises.
pub async fn query(events: &dyn EventsBinding, filters: &Value, scope: Option<&str>) -> Result<Value, GatewayError> {
    let data = events.search(filters, scope).await?;
    let facets = events.facets("type", filters, scope).await?;
    Ok(json!({ "data": data, "facets": facets }))
}

/// `GET /events/:type` drill-down: `type` is folded into `filters.type`.
///
/// # Errors
///
/// Whatever the [`EventsBinding`] raises.
pub async fn drill_down(
    events: &dyn EventsBinding,
    event_type: &str,
    mut filters: Value,
    scope: Option<&str>,
) -> Result<Value, GatewayError> {
    if let Value::Object(map) = &mut filters {
        map.insert("type".to_string(), Value::String(event_type.to_string()));
    } else {
        filters = json!({ "type": event_type });
    }
    events.search(&filters, scope).await
}

/// `GET /{category}` top-level curated browse for a configured category
/// (e.g. `/commits`, `/errors`). Equivalent to [`drill_down`] with the
/// category as the type filter, kept as a distinct entry point because a
/// curated category is a route, not a query parameter.
///
/// # Errors
///
/// Whatever the [`EventsBinding`] raises.
pub async fn browse_category(events: &dyn EventsBinding, category: &str, scope: Option<&str>) -> Result<Value, GatewayError> {
    drill_down(events, category, Value::Null, scope).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeEvents;

    #[async_trait]
    impl EventsBinding for FakeEvents {
        async fn search(&self, filters: &Value, _scope: Option<&str>) -> Result<Value, GatewayError> {
            Ok(json!({ "data": [], "filters": filters }))
        }
        async fn facets(&self, dimension: &str, _filters: &Value, _scope: Option<&str>) -> Result<Value, GatewayError> {
            Ok(json!({ "facets": [], "dimension": dimension }))
        }
        async fn count(&self, _filters: &Value, _group_by: Option<&str>, _scope: Option<&str>) -> Result<Value, GatewayError> {
            Ok(json!({ "count": 0 }))
        }
        async fn sql(&self, _query: &str, _params: &Value) -> Result<Value, GatewayError> {
            Ok(json!({ "data": [] }))
        }
    }

    #[test]
    fn anonymous_rejected_when_auth_required() {
        let err = resolve_scope(None, true).unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::Unauthorized);
    }

    #[test]
    fn anonymous_allowed_when_auth_not_required() {
        assert_eq!(resolve_scope(None, false).unwrap(), None);
    }

    #[test]
    fn authenticated_principal_scoped_to_org() {
        let principal = Principal { subject: "u1".into(), org: Some("acme".into()) };
        assert_eq!(resolve_scope(Some(&principal), true).unwrap(), Some("acme".to_string()));
    }

    #[test]
    fn authenticated_principal_without_org_sees_everything() {
        let principal = Principal { subject: "u1".into(), org: None };
        assert_eq!(resolve_scope(Some(&principal), true).unwrap(), None);
    }

    #[tokio::test]
    async fn discover_caches_repeated_calls() {
        let events = FakeEvents;
        let cache = DiscoveryCache::new(Duration::from_secs(300));
        let first = discover(&events, &cache, Some("acme"), None).await.unwrap();
        let second = discover(&events, &cache, Some("acme"), None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn discover_expires_after_ttl() {
        let events = FakeEvents;
        let cache = DiscoveryCache::new(Duration::from_millis(1));
        discover(&events, &cache, Some("acme"), None).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&(Some("acme".to_string()), None)).is_none());
    }

    #[tokio::test]
    async fn drill_down_folds_type_into_filters() {
        let events = FakeEvents;
        let value = drill_down(&events, "commit", Value::Null, None).await.unwrap();
        assert_eq!(value["filters"]["type"], "commit");
    }
}
