//! Pure, synchronous core of the declarative API gateway.
//!
//! Nothing in this crate touches I/O: it classifies paths, encodes and
//! decodes identifiers, parses query-string filters and sort specs, signs
//! and validates mutation-confirmation hashes, and assembles the envelope
//! shape the rest of the gateway serializes. `gateway-runtime` wires these
//! primitives to `axum`; `gateway-registry` and `gateway-conventions` build
//! on top of them.
//!
//! # Types
//!
//! - [`Identifier`] / [`pluralize`] — `type_sqid` parsing and collection naming
//! - [`Sqid`] — reversible integer-list encoding used inside identifiers
//! - [`TypeRegistry`] — `modelName ↔ u32` table with a content-addressed version
//! - [`ParsedRoute`] / [`classify`] — the seven-way router
//! - [`ParsedFunctionCall`] / [`parse_function_call`] — `name(arg,k=v)` parsing
//! - [`resolve_tenant`] — tenant derivation from path/header/subdomain/claim
//! - [`Filter`] / [`parse_filters`] — MongoDB-style query filters
//! - [`SortSpec`] — `field,-field` sort parsing
//! - [`ConfirmParams`] / [`confirm_hash`] / [`validate_confirm`] — the HMAC confirmation protocol
//! - [`Envelope`] — the ordered response envelope
//! - [`GatewayError`] — the error taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod confirm;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod function_call;
pub mod identifier;
pub mod router;
pub mod sort;
pub mod sqid;
pub mod tenant;
pub mod type_registry;

pub use confirm::{confirm_hash, time_bucket, validate_confirm, ConfirmParams, HASH_LEN, TTL_MS};
pub use envelope::{apply_transforms, render_markdown, DomainRewriteConfig, Envelope, RespondOptions};
pub use error::{ErrorCode, FieldError, GatewayError};
pub use filter::{parse_filters, Filter, FilterOp, FilterValue};
pub use function_call::{parse_function_call, ArgValue, ParsedFunctionCall};
pub use identifier::{pluralize, Identifier};
pub use router::{classify, ParsedRoute, RouteKind};
pub use sort::{SortKey, SortSpec};
pub use sqid::{Sqid, SqidAlphabet};
pub use tenant::{resolve_tenant, TenantResolution, TenantResolverConfig, TenantSource};
pub use type_registry::TypeRegistry;
