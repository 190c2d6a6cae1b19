//! The proxy convention: forwards a request to an allow-listed upstream
//! and wraps its response, mapping upstream failure modes into the
//! taxonomy's proxy-specific errors (§4.15) rather than leaking a raw
//! transport error.

use gateway_core::GatewayError;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// An allow-listed proxy target: every forwarded path must fall under one
/// of `allowed_prefixes`.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// The upstream's base URL, e.g. `"https://api.upstream.example.com"`.
    pub base_url: String,
    /// Path prefixes a request is allowed to target, e.g. `["/v1/"]`.
    pub allowed_prefixes: Vec<String>,
}

/// Validate a proxy target path before any network call is made.
///
/// # Errors
///
/// `INVALID_PATH` if the path contains `..` (directory traversal);
/// `PATH_NOT_ALLOWED` if it's well-formed but outside every configured
/// prefix.
pub fn validate_target_path(config: &ProxyConfig, path: &str) -> Result<(), GatewayError> {
    if path.split('/').any(|segment| segment == "..") {
        return Err(GatewayError::invalid_path(format!("\"{path}\" contains directory traversal")));
    }
    if config.allowed_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
        Ok(())
    } else {
        Err(GatewayError::path_not_allowed(format!("\"{path}\" is outside the configured allow-list")))
    }
}

/// Forward a request to `path` under `config.base_url` and return the
/// upstream's JSON body.
///
/// # Errors
///
/// Propagates [`validate_target_path`]'s errors; `INTERNAL_ERROR` if the
/// upstream can't be reached at all; otherwise whatever
/// [`classify_response`] derives from the upstream's status/content-type/body.
pub async fn forward(
    client: &reqwest::Client,
    config: &ProxyConfig,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> Result<Value, GatewayError> {
    validate_target_path(config, path)?;

    let method = Method::from_bytes(method.as_bytes()).map_err(|_| GatewayError::bad_request(format!("unsupported HTTP method \"{method}\"")))?;
    let url = format!("{}{}", config.base_url, path);
    let mut request = client.request(method, &url);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::internal(format!("upstream unreachable: {e}")))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::internal(format!("failed to read upstream body: {e}")))?;

    classify_response(status, &content_type, &text)
}

/// Pure classification of an upstream response into either its parsed
/// JSON body or the applicable taxonomy error — kept separate from
/// [`forward`] so the status/content-type/body matrix is unit-testable
/// without a network call.
///
/// # Errors
///
/// `UPSTREAM_INVALID_JSON` if `content_type` claims JSON but `body` does
/// not parse as JSON; `PROXY_ERROR` (preserving `status`) on any 4xx/5xx.
pub fn classify_response(status: StatusCode, content_type: &str, body: &str) -> Result<Value, GatewayError> {
    let claims_json = content_type.contains("application/json");
    let parsed: Result<Value, _> = serde_json::from_str(body);

    if claims_json {
        if let Ok(value) = &parsed {
            if status.is_client_error() || status.is_server_error() {
                return Err(GatewayError::proxy_error(upstream_message(value, body), status.as_u16()).with_details(value.clone()));
            }
            return Ok(value.clone());
        }
        return Err(GatewayError::upstream_invalid_json(format!(
            "upstream claimed application/json but body did not parse: {body}"
        )));
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(GatewayError::proxy_error(format!("upstream responded {status}"), status.as_u16()));
    }

    Ok(parsed.unwrap_or_else(|_| Value::String(body.to_string())))
}

fn upstream_message(value: &Value, body: &str) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ProxyConfig {
        ProxyConfig {
            base_url: "https://upstream.example.com".to_string(),
            allowed_prefixes: vec!["/v1/".to_string()],
        }
    }

    #[test]
    fn rejects_directory_traversal() {
        let err = validate_target_path(&config(), "/v1/../secrets").unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::InvalidPath);
    }

    #[test]
    fn rejects_path_outside_allow_list() {
        let err = validate_target_path(&config(), "/v2/accounts").unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::PathNotAllowed);
    }

    #[test]
    fn accepts_allow_listed_path() {
        assert!(validate_target_path(&config(), "/v1/accounts").is_ok());
    }

    #[test]
    fn classify_success_json_passes_through() {
        let result = classify_response(StatusCode::OK, "application/json", r#"{"ok":true}"#).unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[test]
    fn classify_json_content_type_with_invalid_body_is_upstream_invalid_json() {
        let err = classify_response(StatusCode::OK, "application/json", "not json").unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::UpstreamInvalidJson);
    }

    #[test]
    fn classify_4xx_json_is_proxy_error_with_preserved_status() {
        let err = classify_response(StatusCode::NOT_FOUND, "application/json", r#"{"message":"gone"}"#).unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::ProxyError);
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.message, "gone");
    }

    #[test]
    fn classify_5xx_non_json_is_proxy_error() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "text/plain", "boom").unwrap_err();
        assert_eq!(err.code, gateway_core::ErrorCode::ProxyError);
        assert_eq!(err.http_status(), 502);
    }
}
