//! The gateway's error taxonomy (§4.15).
//!
//! Every error the gateway returns is one of a fixed, named set of codes —
//! not an ad hoc HTTP status. [`GatewayError::to_value`] renders the body
//! that goes inside an [`crate::envelope::Envelope`]'s `error` key:
//! `{code, message, status}` plus whichever of `fields`/`retryAfter`/
//! `details`/`links` the error carries. This crate has no `axum`
//! dependency, so turning a [`GatewayError`] into an HTTP response is
//! `gateway-runtime`'s job — this module only owns the taxonomy and its
//! wire shape.

use serde_json::Value;

/// The fixed taxonomy of error categories a gateway response can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The request was structurally invalid.
    BadRequest,
    /// The caller could not be authenticated.
    Unauthorized,
    /// The caller is authenticated but not allowed to perform this action.
    Forbidden,
    /// No route, entity, or meta-resource matched the request.
    NotFound,
    /// `POST /rpc` or `tools/call` named a method that isn't registered.
    MethodNotFound,
    /// Input validation failed before any storage call was attempted.
    ValidationError,
    /// A create would collide with an existing, uniquely-constrained entity.
    Conflict,
    /// The caller exceeded a rate limit.
    RateLimited,
    /// The action requires a subscription or balance the caller lacks.
    PaymentRequired,
    /// An unexpected failure inside the gateway or a downstream binding.
    InternalError,
    /// A request body claimed to be JSON but didn't parse as JSON.
    InvalidJson,
    /// `POST /rpc` body didn't match `{path: [name], args: [...]}`.
    InvalidRpcRequest,
    /// The named registry function does not exist.
    FunctionNotFound,
    /// A registered function's handler raised an error.
    FunctionError,
    /// An upstream proxy target responded with a 4xx/5xx.
    ProxyError,
    /// An upstream proxy target claimed `Content-Type: application/json`
    /// but its body did not parse as JSON.
    UpstreamInvalidJson,
    /// A path-validated proxy target fell outside the configured allow-list.
    PathNotAllowed,
    /// A path-validated proxy target contained directory traversal.
    InvalidPath,
}

impl ErrorCode {
    /// The default HTTP status this category maps to. [`GatewayError`] can
    /// override this (used by `ProxyError`, which preserves the upstream's
    /// actual status).
    #[must_use]
    pub const fn default_http_status(self) -> u16 {
        match self {
            ErrorCode::BadRequest
            | ErrorCode::InvalidJson
            | ErrorCode::InvalidRpcRequest
            | ErrorCode::InvalidPath => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::PaymentRequired => 402,
            ErrorCode::Forbidden | ErrorCode::PathNotAllowed => 403,
            ErrorCode::NotFound | ErrorCode::MethodNotFound | ErrorCode::FunctionNotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::ValidationError => 422,
            ErrorCode::RateLimited => 429,
            ErrorCode::InternalError | ErrorCode::FunctionError => 500,
            ErrorCode::ProxyError | ErrorCode::UpstreamInvalidJson => 502,
        }
    }

    /// The stable, upper-snake code string carried as `error.code`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::PaymentRequired => "PAYMENT_REQUIRED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::InvalidRpcRequest => "INVALID_RPC_REQUEST",
            ErrorCode::FunctionNotFound => "FUNCTION_NOT_FOUND",
            ErrorCode::FunctionError => "FUNCTION_ERROR",
            ErrorCode::ProxyError => "PROXY_ERROR",
            ErrorCode::UpstreamInvalidJson => "UPSTREAM_INVALID_JSON",
            ErrorCode::PathNotAllowed => "PATH_NOT_ALLOWED",
            ErrorCode::InvalidPath => "INVALID_PATH",
        }
    }
}

/// A single field-validation failure, as produced by the database/CRUD
/// convention before any storage call runs.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// The offending field's name.
    pub field: String,
    /// A human-readable explanation.
    pub message: String,
    /// What the schema expected (a type name, an enum, a format).
    pub expected: String,
    /// What was actually given, rendered as a string for display.
    pub received: String,
}

/// A taxonomy-classified gateway error with a message, optional per-field
/// detail, and hypermedia links.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GatewayError {
    /// The error category.
    pub code: ErrorCode,
    /// A message safe to return to the caller.
    pub message: String,
    /// Per-field validation failures (`VALIDATION_ERROR` only).
    pub fields: Option<Vec<FieldError>>,
    /// Seconds until the caller may retry (`RATE_LIMITED` only).
    pub retry_after: Option<u64>,
    /// Arbitrary structured detail a handler wants to attach.
    pub details: Option<Value>,
    /// Hypermedia action links relevant to recovering from this error.
    pub links: Option<Value>,
    /// Overrides [`ErrorCode::default_http_status`] — used by `ProxyError`
    /// to preserve the upstream's actual status code.
    pub status_override: Option<u16>,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// Construct a bare error of the given category.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
            retry_after: None,
            details: None,
            links: None,
            status_override: None,
        }
    }

    /// `400 BAD_REQUEST`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// `401 UNAUTHORIZED`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// `403 FORBIDDEN`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// `404 NOT_FOUND`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// `404 METHOD_NOT_FOUND`.
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotFound, message)
    }

    /// `422 VALIDATION_ERROR`, carrying per-field failures.
    #[must_use]
    pub fn validation_error(fields: Vec<FieldError>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::new(ErrorCode::ValidationError, "one or more fields failed validation")
        }
    }

    /// `409 CONFLICT`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// `429 RATE_LIMITED`, carrying the `Retry-After` seconds.
    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(ErrorCode::RateLimited, message)
        }
    }

    /// `402 PAYMENT_REQUIRED`.
    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentRequired, message)
    }

    /// `500 INTERNAL_ERROR`. Never include a stack trace or internal detail
    /// in `message` — this is the one error shape every uncaught panic or
    /// downstream failure is flattened to before it reaches a client.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// `400 INVALID_JSON`.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidJson, message)
    }

    /// `400 INVALID_RPC_REQUEST`.
    pub fn invalid_rpc_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRpcRequest, message)
    }

    /// `404 FUNCTION_NOT_FOUND`.
    pub fn function_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FunctionNotFound, message)
    }

    /// `500 FUNCTION_ERROR`, wrapping a handler's own failure message.
    pub fn function_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FunctionError, message)
    }

    /// `PROXY_ERROR`, preserving the upstream's actual status code.
    pub fn proxy_error(message: impl Into<String>, upstream_status: u16) -> Self {
        Self {
            status_override: Some(upstream_status),
            ..Self::new(ErrorCode::ProxyError, message)
        }
    }

    /// `502 UPSTREAM_INVALID_JSON`.
    pub fn upstream_invalid_json(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamInvalidJson, message)
    }

    /// `403 PATH_NOT_ALLOWED` — the target was well-formed but outside the
    /// configured allow-list.
    pub fn path_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PathNotAllowed, message)
    }

    /// `400 INVALID_PATH` — directory traversal was detected in the target.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPath, message)
    }

    /// Attach hypermedia links (e.g. `home`/`status`) to this error.
    #[must_use]
    pub fn with_links(mut self, links: Value) -> Self {
        self.links = Some(links);
        self
    }

    /// Attach arbitrary structured detail.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The HTTP status this error maps to: the code's default, unless
    /// [`Self::status_override`] was set (only `ProxyError` does this).
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status_override.unwrap_or_else(|| self.code.default_http_status())
    }

    /// Render the `{"code", "message", "status", ...}` body that goes
    /// inside an envelope's `error` field.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), Value::String(self.code.as_str().to_string()));
        map.insert("message".to_string(), Value::String(self.message.clone()));
        map.insert("status".to_string(), Value::from(self.http_status()));
        if let Some(fields) = &self.fields {
            let rendered: Vec<Value> = fields
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "field": f.field,
                        "message": f.message,
                        "expected": f.expected,
                        "received": f.received,
                    })
                })
                .collect();
            map.insert("fields".to_string(), Value::Array(rendered));
        }
        if let Some(retry_after) = self.retry_after {
            map.insert("retryAfter".to_string(), Value::from(retry_after));
        }
        if let Some(details) = &self.details {
            map.insert("details".to_string(), details.clone());
        }
        if let Some(links) = &self.links {
            map.insert("links".to_string(), links.clone());
        }
        Value::Object(map)
    }
}
