//! Tenant resolution as an Axum extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use gateway_core::{resolve_tenant, TenantResolution};

use crate::context::GatewayState;

/// An Axum extractor that resolves the active tenant per the priority
/// chain in [`gateway_core::resolve_tenant`]: path prefix, `x-tenant`
/// header, subdomain, then falls back to `"default"`.
///
/// The `org` claim tier is populated by auth middleware that runs before
/// this extractor and inserts a [`crate::Principal`] into request
/// extensions; if none is present, that tier is simply skipped.
#[derive(Debug, Clone)]
pub struct TenantExtractor(pub TenantResolution);

impl<S> FromRequestParts<S> for TenantExtractor
where
    GatewayState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gateway_state = GatewayState::from_ref(state);

        let header_tenant = parts
            .headers
            .get("x-tenant")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let host = parts
            .headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let principal_org = parts
            .extensions
            .get::<crate::context::Principal>()
            .and_then(|p| p.org.clone());

        let resolution = resolve_tenant(
            parts.uri.path(),
            header_tenant.as_deref(),
            host.as_deref(),
            principal_org.as_deref(),
            &gateway_state.tenant_config,
        );

        Ok(TenantExtractor(resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn resolves_from_path() {
        let state = GatewayState::permissive(b"s".to_vec());
        let mut parts = parts_for("/~acme/contacts", &[]);
        let TenantExtractor(resolution) = TenantExtractor::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(resolution.tenant, "acme");
    }

    #[tokio::test]
    async fn resolves_from_header_when_no_path_prefix() {
        let state = GatewayState::permissive(b"s".to_vec());
        let mut parts = parts_for("/contacts", &[("x-tenant", "acme")]);
        let TenantExtractor(resolution) = TenantExtractor::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(resolution.tenant, "acme");
    }

    #[tokio::test]
    async fn falls_back_to_default() {
        let state = GatewayState::permissive(b"s".to_vec());
        let mut parts = parts_for("/contacts", &[]);
        let TenantExtractor(resolution) = TenantExtractor::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(resolution.tenant, "default");
    }
}
