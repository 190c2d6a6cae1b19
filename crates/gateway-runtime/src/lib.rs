//! Axum wiring for the declarative API gateway.
//!
//! `gateway-core` stays pure and synchronous; this crate bridges it to
//! `axum`: turning a [`gateway_core::GatewayError`] into an HTTP response,
//! extracting the active tenant and response-mode flags from a request,
//! and the small middleware stack (auth, rate limiting, CORS, tracing)
//! every route sits behind.
//!
//! # Types
//!
//! - [`RuntimeError`] — wraps [`gateway_core::GatewayError`] as an [`axum::response::IntoResponse`]
//! - [`sse_error_event`] — formats a [`gateway_core::GatewayError`] as an SSE event
//! - [`GatewayState`] — shared application state (auth, rate limiter, tenant config, confirm secret)
//! - [`GatewayContext`] — the per-request bundle (tenant, principal, response-mode flags)
//! - [`AuthProvider`] / [`Principal`] — pluggable authentication
//! - [`RateLimiter`] — pluggable request rate limiting
//! - [`render_response`] — assemble the final HTTP response for an envelope plus response mode
//! - [`stream_envelope`] / [`stream_error`] — `?stream` SSE rendering

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod context;
mod error;
pub mod middleware;
mod respond;
mod sse;

pub use context::{AuthProvider, GatewayContext, GatewayState, NoopRateLimiter, Principal, RateLimitOutcome, RateLimiter, WindowRateLimiter};
pub use error::{sse_error_event, RuntimeError};
pub use respond::{parse_respond_options, render_response};
pub use sse::{stream_envelope, stream_error};
