//! The request-level middleware stack: tenant resolution, the mutation
//! confirmation gate, and the CORS/tracing layers every route sits behind.

mod confirm;
mod layers;
mod tenant;

pub use confirm::{build_preview_hash, require_confirm, requires_confirmation};
pub use layers::{cors_layer, request_id_layers, trace_layer};
pub use tenant::TenantExtractor;
