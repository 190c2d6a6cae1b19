//! Pluggable conventions plugged into the gateway: CRUD/database (§4.14),
//! events (§4.13), proxy, function dispatch over `/rpc`/`/mcp` (§4.10),
//! the meta-resource dispatch table (§4.9), the `/qa` test-observability
//! surface (§4.19), and the single `GatewayConfig` (§4.17) everything
//! else is synthesized from.
//!
//! # Types
//!
//! - [`GatewayConfig`] — the single configuration value
//! - [`DatabaseBinding`] / [`EventsBinding`] — external collaborator contracts (§6)
//! - [`meta::handle_meta`] — `$pageSize`/`$sort`/`$count`/`$schema`/`$pages`/`$facets`/`$history`/`$events`
//! - [`functions::handle_rpc_call`] / [`functions::handle_mcp`] — transport-equivalent dispatch
//! - CRUD helpers in [`crud`] — validation, meta-field injection, soft-delete
//! - [`events::discover`] / [`events::query`] — the events convention
//! - [`proxy::forward`] — the proxy convention
//! - [`qa::handle_qa`] — the `/qa` surface

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bindings;
pub mod config;
pub mod crud;
pub mod events;
pub mod functions;
pub mod meta;
pub mod proxy;
pub mod qa;

pub use bindings::{DatabaseBinding, EventsBinding, UnconfiguredDatabaseBinding, UnconfiguredEventsBinding};
pub use config::GatewayConfig;
