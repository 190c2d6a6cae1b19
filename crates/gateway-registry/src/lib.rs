//! Transport-equivalent function registry (§4.10).
//!
//! A single [`GatewayFunction`] implementation is reachable three ways —
//! the URL function-call syntax (`score(contact_abc)`), the JSON-RPC
//! `/rpc` endpoint, and MCP `tools/call` — and [`dispatch_call`] is the
//! one place any of them actually invoke it, so the three transports are
//! provably equivalent rather than independently reimplemented.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dispatch;
mod function;
mod registry;

pub use dispatch::dispatch_call;
pub use function::GatewayFunction;
pub use registry::{GatewayRegistry, RegistryBuilder};
