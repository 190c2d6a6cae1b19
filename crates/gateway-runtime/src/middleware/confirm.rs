//! Enforcing the mutation confirmation gate at the handler boundary (§4.8).

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use gateway_core::{confirm_hash, time_bucket, validate_confirm, ConfirmParams, GatewayError};

/// The actions that trigger the confirmation protocol by default when a
/// convention doesn't supply its own list: the mutating verbs plus any
/// lowercase-alphabetic verb that isn't in the known read-set and doesn't
/// start with `$` (§4.8).
const DEFAULT_MUTATING_ACTIONS: &[&str] = &["create", "update", "delete", "revert"];
const KNOWN_READ_ACTIONS: &[&str] = &["list", "get", "find", "search", "count", "export", "schema"];

/// `true` if `action` should be routed through the two-phase confirmation
/// protocol rather than executed immediately.
#[must_use]
pub fn requires_confirmation(action: &str) -> bool {
    if action.starts_with('$') {
        return false;
    }
    if DEFAULT_MUTATING_ACTIONS.contains(&action) {
        return true;
    }
    if KNOWN_READ_ACTIONS.contains(&action) {
        return false;
    }
    action.chars().all(|c| c.is_ascii_lowercase())
}

/// Unix-milliseconds wall clock, used to bucket confirmation hashes.
fn now_ms() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .map_err(|_| GatewayError::internal("system clock before unix epoch"))
}

/// Phase 1: compute the confirmation hash for a mutating GET that arrived
/// without a `confirm` query parameter. The caller embeds the result in
/// the `execute` URL of the preview it returns.
///
/// # Errors
///
/// Propagates a clock-read failure as [`GatewayError::internal`].
pub fn build_preview_hash(secret: &[u8], params: &ConfirmParams<'_>) -> Result<String, GatewayError> {
    let bucket = time_bucket(now_ms()?);
    Ok(confirm_hash(secret, params, bucket))
}

/// Phase 2: validate a caller-supplied `confirm` hash against `params`.
///
/// # Errors
///
/// Returns [`GatewayError::bad_request`] when the hash is missing, expired,
/// or doesn't match the fingerprinted mutation — the message points the
/// caller back at re-requesting the preview (a plain GET without
/// `confirm`) rather than retrying blindly.
pub fn require_confirm(secret: &[u8], params: &ConfirmParams<'_>, given: Option<&str>) -> Result<(), GatewayError> {
    let Some(given) = given else {
        return Err(GatewayError::bad_request(
            "mutation requires a confirm token; GET this route without `confirm` first to obtain one",
        ));
    };
    if validate_confirm(secret, params, now_ms()?, given) {
        Ok(())
    } else {
        Err(GatewayError::bad_request(
            "confirm token is missing, expired, or does not match this request; re-request the preview",
        ))
    }
}
