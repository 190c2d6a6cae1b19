//! Wires `gateway-core`/`gateway-runtime`/`gateway-registry`/
//! `gateway-conventions` into one `axum::Router`, plus the `serve` binary
//! in `main.rs`.
//!
//! This crate is deliberately thin: [`app::build_router`] and
//! [`state::AppState`] are the two things worth testing in isolation
//! (end-to-end, via `tower::ServiceExt::oneshot`), everything else is
//! bootstrap.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod app;
pub mod dispatch;
pub mod state;

pub use app::build_router;
pub use state::{AppState, Dependencies};
