//! The single configuration value the whole gateway is synthesized from
//! (§4.17, §9 "configuration objects"). Loaded from TOML, then overlaid
//! with `GATEWAY_`-prefixed environment variables, the same layering
//! order the pack uses elsewhere for service config. Unknown keys are
//! rejected at load time (`deny_unknown_fields`) so a typo in the config
//! file fails at boot, not silently at request time.

use std::path::Path;

use serde::Deserialize;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Known tenants and domain-resolution rules.
    pub tenants: TenantsConfig,
    /// Mutation confirmation protocol settings.
    pub confirm: ConfirmConfig,
    /// Rate-limiting window and budget.
    pub rate_limit: RateLimitConfig,
    /// Events convention settings.
    pub events: EventsConfig,
    /// Type registry seed list (`modelName -> number`).
    pub type_registry: Vec<TypeRegistryEntry>,
    /// Per-convention enable/disable toggles.
    pub conventions: ConventionToggles,
    /// `$pageSize`/`$sort` meta-resource option sets (§4.9).
    pub meta: MetaConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tenants: TenantsConfig::default(),
            confirm: ConfirmConfig::default(),
            rate_limit: RateLimitConfig::default(),
            events: EventsConfig::default(),
            type_registry: Vec::new(),
            conventions: ConventionToggles::default(),
            meta: MetaConfig::default(),
        }
    }
}

/// The option sets the `$pageSize` and `$sort` meta-resources build their
/// value→URL maps from (§4.9): the page sizes a collection may be asked
/// for via `?limit=N`, and the fields it may be sorted by via `?sort=`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    /// Offered `?limit=N` values for `$pageSize`.
    pub page_sizes: Vec<u64>,
    /// Field names offered as `?sort=field`/`?sort=-field` for `$sort`.
    pub sortable_fields: Vec<String>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            page_sizes: vec![10, 25, 50, 100],
            sortable_fields: vec!["createdAt".to_string(), "updatedAt".to_string(), "name".to_string()],
        }
    }
}

/// Server bind address and CORS origins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_address: String,
    /// Allowed CORS origins; empty means permissive (any origin).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

/// Known tenant slugs and the domains used to resolve a tenant from a
/// request subdomain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantsConfig {
    /// Explicitly registered tenant slugs (informational; unregistered
    /// slugs still resolve, they're simply not pre-declared).
    pub known: Vec<String>,
    /// Base domains a subdomain is matched against for tenant resolution.
    pub base_domains: Vec<String>,
    /// Subdomains that never resolve to a tenant (`api`, `app`, `docs`, ...).
    pub system_subdomains: Vec<String>,
}

/// HMAC secret and TTL for the confirmation protocol (§4.8).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfirmConfig {
    /// HMAC key. Required for any mutation confirmation path to be
    /// trustworthy; an empty secret is accepted only for local
    /// development and logged as a warning at boot.
    pub secret: String,
    /// Bucket time-to-live in milliseconds.
    pub ttl_ms: u64,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_ms: gateway_core::TTL_MS,
        }
    }
}

/// Rate-limit window and request budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    pub window_secs: u64,
    /// Maximum requests per window per key.
    pub max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 600,
        }
    }
}

/// Events convention configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Curated top-level categories mounted as `/{category}` routes.
    pub categories: Vec<String>,
    /// Default `since` window applied when a request omits one (e.g. `"24h"`).
    pub default_since: Option<String>,
    /// Discovery cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Whether an anonymous caller is rejected with `UNAUTHORIZED` rather
    /// than served an unscoped view.
    pub auth_required: bool,
}

/// One `modelName -> number` seed entry for [`gateway_core::TypeRegistry`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeRegistryEntry {
    /// The model's name, e.g. `"contact"`.
    pub name: String,
    /// Its stable numeric id.
    pub number: u32,
}

/// Enable/disable toggles for each pluggable convention.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConventionToggles {
    /// CRUD/database convention (§4.14).
    pub crud: bool,
    /// Events convention (§4.13).
    pub events: bool,
    /// Proxy convention (§7).
    pub proxy: bool,
    /// `/qa` test-observability surface (§4.19).
    pub qa: bool,
}

impl Default for ConventionToggles {
    fn default() -> Self {
        Self {
            crud: true,
            events: false,
            proxy: false,
            qa: true,
        }
    }
}

/// Environment variable prefix used to overlay [`GatewayConfig`] values
/// loaded from file. Only the handful of secret/deployment-specific
/// scalars are overridable this way; structural config (conventions,
/// type registry) stays file-only.
pub const ENV_PREFIX: &str = "GATEWAY_";

impl GatewayConfig {
    /// Load configuration from a TOML file, then apply any `GATEWAY_*`
    /// environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains unknown
    /// keys, or otherwise fails to parse as a [`GatewayConfig`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `GATEWAY_*` environment overrides in place. Exposed
    /// separately from [`Self::load`] so tests (and a config built purely
    /// in-process) can apply the same overlay without a file on disk.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}BIND_ADDRESS")) {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}CONFIRM_SECRET")) {
            self.confirm.secret = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}CONFIRM_TTL_MS")) {
            if let Ok(ttl) = v.parse() {
                self.confirm.ttl_ms = ttl;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}RATE_LIMIT_MAX_REQUESTS")) {
            if let Ok(max) = v.parse() {
                self.rate_limit.max_requests = max;
            }
        }
    }
}
