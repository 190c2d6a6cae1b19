//! Tenant resolution: derive the active tenant from a request.

/// Where a resolved tenant came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    /// A leading `/~slug/` path segment.
    Path,
    /// The `x-tenant` header.
    Header,
    /// A subdomain matched against a configured base domain.
    Subdomain,
    /// The `org` claim on the resolved principal.
    Claim,
    /// No other source matched; the literal `"default"` tenant was used.
    Default,
}

/// The outcome of tenant resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolution {
    /// The resolved tenant slug.
    pub tenant: String,
    /// Which priority tier produced it.
    pub source: TenantSource,
}

/// Configuration for [`resolve_tenant`].
#[derive(Debug, Clone, Default)]
pub struct TenantResolverConfig {
    /// Base domains subdomains are matched against, e.g. `["example.com"]`.
    pub base_domains: Vec<String>,
    /// Subdomains that are never treated as a tenant (`api`, `app`, `docs`, …).
    pub system_subdomains: Vec<String>,
}

/// Resolve the active tenant for a request.
///
/// Priority order, first match wins: path prefix `/~slug/`, the `x-tenant`
/// header, a subdomain match against `config.base_domains` (excluding
/// `config.system_subdomains`), the `org` claim on the resolved principal,
/// then the literal `"default"`.
#[must_use]
pub fn resolve_tenant(
    path: &str,
    header_tenant: Option<&str>,
    host: Option<&str>,
    principal_org: Option<&str>,
    config: &TenantResolverConfig,
) -> TenantResolution {
    if let Some(slug) = path_tenant(path) {
        return TenantResolution {
            tenant: slug,
            source: TenantSource::Path,
        };
    }

    if let Some(tenant) = header_tenant.filter(|t| !t.is_empty()) {
        return TenantResolution {
            tenant: tenant.to_string(),
            source: TenantSource::Header,
        };
    }

    if let Some(host) = host {
        if let Some(subdomain) = subdomain_tenant(host, config) {
            return TenantResolution {
                tenant: subdomain,
                source: TenantSource::Subdomain,
            };
        }
    }

    if let Some(org) = principal_org.filter(|o| !o.is_empty()) {
        return TenantResolution {
            tenant: org.to_string(),
            source: TenantSource::Claim,
        };
    }

    TenantResolution {
        tenant: "default".to_string(),
        source: TenantSource::Default,
    }
}

fn path_tenant(path: &str) -> Option<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let rest = trimmed.strip_prefix('~')?;
    let slug = rest.split('/').next().unwrap_or(rest);
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

fn subdomain_tenant(host: &str, config: &TenantResolverConfig) -> Option<String> {
    let host = host.split(':').next().unwrap_or(host);
    for base in &config.base_domains {
        let suffix = format!(".{base}");
        if let Some(prefix) = host.strip_suffix(&suffix) {
            if prefix.is_empty() || prefix.contains('.') {
                continue;
            }
            if config
                .system_subdomains
                .iter()
                .any(|s| s.eq_ignore_ascii_case(prefix))
            {
                continue;
            }
            return Some(prefix.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TenantResolverConfig {
        TenantResolverConfig {
            base_domains: vec!["example.com".into()],
            system_subdomains: vec!["api".into(), "app".into(), "docs".into()],
        }
    }

    #[test]
    fn path_prefix_wins_over_everything() {
        let res = resolve_tenant(
            "/~acme/contacts",
            Some("other"),
            Some("foo.example.com"),
            Some("third"),
            &config(),
        );
        assert_eq!(res.tenant, "acme");
        assert_eq!(res.source, TenantSource::Path);
    }

    #[test]
    fn header_wins_over_subdomain_and_claim() {
        let res = resolve_tenant(
            "/contacts",
            Some("from-header"),
            Some("foo.example.com"),
            Some("from-claim"),
            &config(),
        );
        assert_eq!(res.tenant, "from-header");
        assert_eq!(res.source, TenantSource::Header);
    }

    #[test]
    fn subdomain_wins_over_claim() {
        let res = resolve_tenant("/contacts", None, Some("acme.example.com"), Some("x"), &config());
        assert_eq!(res.tenant, "acme");
        assert_eq!(res.source, TenantSource::Subdomain);
    }

    #[test]
    fn system_subdomains_are_excluded() {
        let res = resolve_tenant("/contacts", None, Some("api.example.com"), Some("acme"), &config());
        assert_eq!(res.tenant, "acme");
        assert_eq!(res.source, TenantSource::Claim);
    }

    #[test]
    fn claim_wins_over_default() {
        let res = resolve_tenant("/contacts", None, None, Some("acme"), &config());
        assert_eq!(res.tenant, "acme");
        assert_eq!(res.source, TenantSource::Claim);
    }

    #[test]
    fn falls_back_to_default() {
        let res = resolve_tenant("/contacts", None, None, None, &config());
        assert_eq!(res.tenant, "default");
        assert_eq!(res.source, TenantSource::Default);
    }

    #[test]
    fn unrelated_host_does_not_match() {
        let res = resolve_tenant("/contacts", None, Some("example.net"), None, &config());
        assert_eq!(res.tenant, "default");
    }
}
