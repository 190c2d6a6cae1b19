//! Process-wide state the assembled router is built against: the
//! `GatewayConfig` everything is synthesized from, plus the external
//! collaborators (§6) a real deployment plugs in — a database, an events
//! store, the function registry, schemas, and `/qa` fixtures.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::FromRef;
use gateway_conventions::crud::ModelSchema;
use gateway_conventions::events::DiscoveryCache;
use gateway_conventions::proxy::ProxyConfig;
use gateway_conventions::qa::QaFixtures;
use gateway_conventions::{DatabaseBinding, EventsBinding, GatewayConfig, UnconfiguredDatabaseBinding, UnconfiguredEventsBinding};
use gateway_core::TypeRegistry;
use gateway_registry::GatewayRegistry;
use gateway_runtime::{AnonymousAuthProvider, AuthProvider, GatewayState, NoopRateLimiter, RateLimiter};

/// The pluggable external collaborators a deployment supplies; every field
/// has a working (if unconfigured) default so `gateway-server` boots
/// without any of them wired in.
pub struct Dependencies {
    /// How to authenticate a request.
    pub auth: Arc<dyn AuthProvider>,
    /// How to rate-limit a request.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// The entity store backing the CRUD/database convention.
    pub database: Arc<dyn DatabaseBinding>,
    /// The store backing the events convention.
    pub events: Arc<dyn EventsBinding>,
    /// Registered `name(args)` / `/rpc` / `/mcp` functions.
    pub registry: GatewayRegistry,
    /// Validation schemas, keyed by model name (e.g. `"contact"`).
    pub schemas: BTreeMap<String, ModelSchema>,
    /// Fixtures the `/qa` test-observability surface reflects.
    pub qa_fixtures: QaFixtures,
    /// The proxy convention's upstream, if configured.
    pub proxy: Option<ProxyConfig>,
    /// HTTP client the proxy convention forwards requests through.
    pub http_client: reqwest::Client,
}

impl Default for Dependencies {
    fn default() -> Self {
        Self {
            auth: Arc::new(AnonymousAuthProvider),
            rate_limiter: Arc::new(NoopRateLimiter),
            database: Arc::new(UnconfiguredDatabaseBinding),
            events: Arc::new(UnconfiguredEventsBinding),
            registry: GatewayRegistry::builder().build(),
            schemas: BTreeMap::new(),
            qa_fixtures: QaFixtures::default(),
            proxy: None,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Everything an Axum handler needs, cloned (cheaply, via `Arc`s) per
/// request. [`GatewayState`] is embedded so `gateway-runtime`'s
/// extractors (`TenantExtractor`) work against this state directly.
#[derive(Clone)]
pub struct AppState {
    /// Shared gateway runtime state (auth, rate limiter, tenant config,
    /// confirm secret).
    pub gateway: GatewayState,
    /// The configuration this state was built from.
    pub config: Arc<GatewayConfig>,
    /// The entity store.
    pub database: Arc<dyn DatabaseBinding>,
    /// The events store.
    pub events: Arc<dyn EventsBinding>,
    /// The function/transport registry.
    pub registry: Arc<GatewayRegistry>,
    /// Validation schemas, keyed by model name.
    pub schemas: Arc<BTreeMap<String, ModelSchema>>,
    /// `/qa` fixtures.
    pub qa_fixtures: Arc<QaFixtures>,
    /// The `modelName <-> u32` registry (§3), seeded from `config.type_registry`.
    pub type_registry: Arc<TypeRegistry>,
    /// The proxy convention's upstream, if configured.
    pub proxy: Option<Arc<ProxyConfig>>,
    /// HTTP client for the proxy convention.
    pub http_client: reqwest::Client,
    /// `GET /events` discovery cache (§4.13).
    pub events_cache: Arc<DiscoveryCache>,
}

impl FromRef<AppState> for GatewayState {
    fn from_ref(state: &AppState) -> Self {
        state.gateway.clone()
    }
}

impl AppState {
    /// Build the process-wide state from a loaded [`GatewayConfig`] and
    /// its [`Dependencies`].
    #[must_use]
    pub fn new(config: GatewayConfig, deps: Dependencies) -> Self {
        let mut type_registry = TypeRegistry::new();
        for entry in &config.type_registry {
            type_registry.register(&entry.name, entry.number);
        }

        let tenant_config = gateway_core::TenantResolverConfig {
            base_domains: config.tenants.base_domains.clone(),
            system_subdomains: config.tenants.system_subdomains.clone(),
        };

        let gateway = GatewayState {
            auth: deps.auth,
            rate_limiter: deps.rate_limiter,
            tenant_config: Arc::new(tenant_config),
            confirm_secret: Arc::new(config.confirm.secret.clone().into_bytes()),
        };

        let cache_ttl = std::time::Duration::from_secs(config.events.cache_ttl_secs.max(1));

        Self {
            gateway,
            config: Arc::new(config),
            database: deps.database,
            events: deps.events,
            registry: Arc::new(deps.registry),
            schemas: Arc::new(deps.schemas),
            qa_fixtures: Arc::new(deps.qa_fixtures),
            type_registry: Arc::new(type_registry),
            proxy: deps.proxy.map(Arc::new),
            http_client: deps.http_client,
            events_cache: Arc::new(DiscoveryCache::new(cache_ttl)),
        }
    }
}
