//! The GET-mutation confirmation protocol (§4.8): a time-bucketed HMAC lets
//! a plain `GET` preview a mutation, then replay the returned 6-hex-char
//! hash to commit it, without a request body.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default time-to-live of a confirmation bucket, in milliseconds (§3).
pub const TTL_MS: u64 = 300_000;

/// How many leading hex characters of the HMAC digest form the token.
pub const HASH_LEN: usize = 6;

/// The inputs a confirmation hash is bound to, per §3: `(action, type,
/// sortedData, tenant, userId, timeBucket)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmParams<'a> {
    /// The mutating verb, e.g. `"create"`, `"delete"`.
    pub action: &'a str,
    /// The entity type the action targets, if any.
    pub type_name: Option<&'a str>,
    /// The mutation payload: every query key except `confirm`, sorted by
    /// key (a [`BTreeMap`] is sorted by construction).
    pub data: &'a BTreeMap<String, String>,
    /// The resolved tenant slug.
    pub tenant: &'a str,
    /// The authenticated caller's id, if any.
    pub user_id: Option<&'a str>,
}

/// Compute the time bucket index for a unix-milliseconds timestamp:
/// `floor(now_ms / `[`TTL_MS`]`)`.
#[must_use]
pub fn time_bucket(now_ms: u64) -> u64 {
    now_ms / TTL_MS
}

fn sorted_data_string(data: &BTreeMap<String, String>) -> String {
    data.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn payload_string(params: &ConfirmParams<'_>, bucket: u64) -> String {
    [
        params.action,
        params.type_name.unwrap_or(""),
        &sorted_data_string(params.data),
        params.tenant,
        params.user_id.unwrap_or(""),
        &bucket.to_string(),
    ]
    .join("|")
}

/// Compute the confirmation hash for `params` within `bucket`, keyed by
/// `secret`: the first [`HASH_LEN`] hex characters of HMAC-SHA-256 over
/// the `|`-joined fingerprint payload.
#[must_use]
pub fn confirm_hash(secret: &[u8], params: &ConfirmParams<'_>, bucket: u64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(payload_string(params, bucket).as_bytes());
    let digest = hex::encode(mac.finalize().into_bytes());
    digest[..HASH_LEN].to_string()
}

/// Validate a caller-supplied confirmation hash against the current time.
///
/// Accepts a hash minted for the bucket containing `now_ms` or the one
/// immediately before it (`t` or `t-1`) — covering a request that straddles
/// a bucket boundary — but never `t+1`: a confirmation can't be honored
/// ahead of when it was mintable. Comparison is constant-time.
#[must_use]
pub fn validate_confirm(secret: &[u8], params: &ConfirmParams<'_>, now_ms: u64, given: &str) -> bool {
    let current = time_bucket(now_ms);
    for bucket in [current, current.saturating_sub(1)] {
        let expected = confirm_hash(secret, params, bucket);
        if bool::from(expected.as_bytes().ct_eq(given.as_bytes())) {
            return true;
        }
        if current == 0 && bucket == 0 {
            break;
        }
    }
    false
}
