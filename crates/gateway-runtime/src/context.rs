//! Shared application state and the per-request context derived from it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::http::HeaderMap;
use gateway_core::{GatewayError, RespondOptions, TenantResolution, TenantResolverConfig};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable subject identifier (e.g. a user id).
    pub subject: String,
    /// The `org` claim, used as a tenant-resolution fallback.
    pub org: Option<String>,
}

/// Pluggable authentication: turns request headers into a [`Principal`].
///
/// Returning `Ok(None)` means the request is anonymous, not rejected —
/// routes that require authentication check for `None` themselves and
/// raise [`GatewayError::unauthorized`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential was present but invalid (expired,
    /// malformed, signature mismatch) — distinct from no credential at all.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Principal>, GatewayError>;
}

/// An [`AuthProvider`] that never authenticates anyone; useful for local
/// development and for conventions that are entirely public.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthProvider;

#[async_trait]
impl AuthProvider for AnonymousAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<Option<Principal>, GatewayError> {
        Ok(None)
    }
}

/// The budget accounting a [`RateLimiter::check`] call reports back,
/// surfaced to the caller as `X-RateLimit-Limit`/`X-RateLimit-Remaining`/
/// `X-RateLimit-Reset` response headers (§6) regardless of whether the
/// request was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests remaining in the current window after this one.
    pub remaining: u64,
    /// Seconds until the window resets.
    pub reset: u64,
}

/// Pluggable request rate limiting.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check whether `key` (typically tenant + principal, or remote IP) is
    /// within budget. Implementations update their own counters as a side
    /// effect of this call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::rate_limited`] once the caller's budget is
    /// spent.
    async fn check(&self, key: &str) -> Result<RateLimitOutcome, GatewayError>;
}

/// A [`RateLimiter`] that never limits anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _key: &str) -> Result<RateLimitOutcome, GatewayError> {
        Ok(RateLimitOutcome { limit: u64::MAX, remaining: u64::MAX, reset: 0 })
    }
}

/// An in-process, fixed-window [`RateLimiter`] (§6/§9): each `key` gets
/// `max_requests` per `window_secs`-long window; the window index is the
/// unix-seconds clock divided by `window_secs`, so every process sharing
/// the same wall clock agrees on the current window without coordination.
pub struct WindowRateLimiter {
    max_requests: u64,
    window_secs: u64,
    windows: Mutex<HashMap<String, (u64, u64)>>,
}

impl WindowRateLimiter {
    /// Build a limiter allowing `max_requests` per `window_secs`-second
    /// window per key.
    #[must_use]
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self { max_requests, window_secs: window_secs.max(1), windows: Mutex::new(HashMap::new()) }
    }

    fn now_secs() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
    }
}

#[async_trait]
impl RateLimiter for WindowRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitOutcome, GatewayError> {
        let now = Self::now_secs();
        let window = now / self.window_secs;
        let reset = self.window_secs - (now % self.window_secs);

        let mut windows = self.windows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = windows.entry(key.to_string()).or_insert((window, 0));
        if entry.0 != window {
            *entry = (window, 0);
        }
        entry.1 += 1;

        if entry.1 > self.max_requests {
            return Err(GatewayError::rate_limited(format!("rate limit exceeded for \"{key}\""), reset));
        }
        Ok(RateLimitOutcome { limit: self.max_requests, remaining: self.max_requests - entry.1, reset })
    }
}

/// Shared, process-wide gateway state, cloned (cheaply, via `Arc`) into
/// every Axum handler.
#[derive(Clone)]
pub struct GatewayState {
    /// How to authenticate a request.
    pub auth: Arc<dyn AuthProvider>,
    /// How to rate-limit a request.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Tenant-resolution configuration (base domains, system subdomains).
    pub tenant_config: Arc<TenantResolverConfig>,
    /// HMAC key for the mutation confirmation protocol.
    pub confirm_secret: Arc<Vec<u8>>,
}

impl GatewayState {
    /// Build state with anonymous auth and no rate limiting — useful for
    /// tests and for conventions that don't need either.
    #[must_use]
    pub fn permissive(confirm_secret: Vec<u8>) -> Self {
        Self {
            auth: Arc::new(AnonymousAuthProvider),
            rate_limiter: Arc::new(NoopRateLimiter),
            tenant_config: Arc::new(TenantResolverConfig::default()),
            confirm_secret: Arc::new(confirm_secret),
        }
    }
}

/// The per-request bundle: the resolved tenant, the authenticated
/// principal (if any), and the requested response-mode transforms.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    /// The resolved tenant and which priority tier produced it.
    pub tenant: TenantResolution,
    /// The authenticated caller, if any.
    pub principal: Option<Principal>,
    /// `?raw` / `?debug` / `?domains` / `?format=md` flags for this request.
    pub respond: RespondOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_provider_returns_none() {
        let provider = AnonymousAuthProvider;
        let result = provider.authenticate(&HeaderMap::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn noop_limiter_always_passes() {
        let limiter = NoopRateLimiter;
        assert!(limiter.check("any-key").await.is_ok());
    }

    #[tokio::test]
    async fn window_limiter_allows_up_to_the_configured_budget() {
        let limiter = WindowRateLimiter::new(2, 60);
        let first = limiter.check("tenant:user").await.unwrap();
        assert_eq!(first.remaining, 1);
        let second = limiter.check("tenant:user").await.unwrap();
        assert_eq!(second.remaining, 0);
    }

    #[tokio::test]
    async fn window_limiter_rejects_once_budget_is_spent() {
        let limiter = WindowRateLimiter::new(1, 60);
        limiter.check("tenant:user").await.unwrap();
        let err = limiter.check("tenant:user").await.unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::RateLimited);
        assert!(err.retry_after.is_some());
    }

    #[tokio::test]
    async fn window_limiter_tracks_keys_independently() {
        let limiter = WindowRateLimiter::new(1, 60);
        assert!(limiter.check("tenant:a").await.is_ok());
        assert!(limiter.check("tenant:b").await.is_ok());
    }

    #[test]
    fn permissive_state_builds() {
        let state = GatewayState::permissive(b"secret".to_vec());
        assert_eq!(state.confirm_secret.as_slice(), b"secret");
    }
}
