//! Parsing `?raw`/`?debug`/`?domains`/`?format=md`/`?array`/`?stream` and
//! rendering the final HTTP response for an [`Envelope`].

use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::{apply_transforms, render_markdown, DomainRewriteConfig, Envelope, RespondOptions};

/// Parse the response-mode flags out of a raw query string (no leading
/// `?`). A flag key present with no value, or with the value `"true"`,
/// turns it on; `"false"` turns it off. `format=md` sets `markdown`.
#[must_use]
pub fn parse_respond_options(query: &str) -> RespondOptions {
    let mut opts = RespondOptions::default();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, "true"));
        let on = value != "false";
        match key {
            "raw" => opts.raw = on,
            "debug" => opts.debug = on,
            "domains" => opts.domains = on,
            "array" => opts.array = on,
            "stream" => opts.stream = on,
            "format" if value == "md" => opts.markdown = true,
            _ => {}
        }
    }
    opts
}

/// Render the final HTTP response for `envelope` under the requested
/// response mode: JSON (transformed per [`apply_transforms`]) by default,
/// `text/markdown` when [`RespondOptions::markdown`] is set, or
/// `text/event-stream` when [`RespondOptions::stream`] is set. `?raw` wins
/// over both — it unwraps the envelope entirely, so neither a Markdown
/// rendering nor an SSE event sequence (which both depend on envelope
/// structure) would make sense layered on top of it.
#[must_use]
pub fn render_response(
    envelope: &Envelope,
    opts: &RespondOptions,
    debug_block: Option<serde_json::Value>,
    domain_cfg: Option<&DomainRewriteConfig>,
) -> Response {
    if opts.stream && !opts.raw {
        return crate::sse::stream_envelope(envelope);
    }
    let value = apply_transforms(envelope, opts, debug_block, domain_cfg);
    if opts.markdown && !opts.raw {
        let body = render_markdown(&value);
        ([(axum::http::header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body).into_response()
    } else {
        Json(value).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> serde_json::Value {
        serde_json::json!({"name": "acme", "type": "crud", "version": "1.0", "description": "d"})
    }

    #[test]
    fn parses_bare_flags_as_true() {
        let opts = parse_respond_options("raw&debug");
        assert!(opts.raw);
        assert!(opts.debug);
        assert!(!opts.domains);
    }

    #[test]
    fn parses_false_value() {
        let opts = parse_respond_options("raw=false");
        assert!(!opts.raw);
    }

    #[test]
    fn parses_format_md() {
        let opts = parse_respond_options("format=md");
        assert!(opts.markdown);
    }

    #[test]
    fn parses_array_and_stream() {
        let opts = parse_respond_options("array&stream");
        assert!(opts.array);
        assert!(opts.stream);
    }

    #[test]
    fn ignores_unrelated_query_params() {
        let opts = parse_respond_options("limit=10&sort=name");
        assert_eq!(opts, RespondOptions::default());
    }

    #[tokio::test]
    async fn renders_json_by_default() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let response = render_response(&envelope, &RespondOptions::default(), None, None);
        let content_type = response.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("application/json"));
    }

    #[tokio::test]
    async fn renders_markdown_when_requested() {
        let envelope = Envelope::new(api()).with_semantic("contacts", serde_json::json!([{"name": "Ada"}]));
        let opts = RespondOptions {
            markdown: true,
            ..Default::default()
        };
        let response = render_response(&envelope, &opts, None, None);
        let content_type = response.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("text/markdown"));
    }

    #[tokio::test]
    async fn raw_beats_markdown() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions {
            raw: true,
            markdown: true,
            ..Default::default()
        };
        let response = render_response(&envelope, &opts, None, None);
        let content_type = response.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("application/json"));
    }

    #[tokio::test]
    async fn renders_event_stream_when_requested() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions {
            stream: true,
            ..Default::default()
        };
        let response = render_response(&envelope, &opts, None, None);
        let content_type = response.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("text/event-stream"));
    }

    #[tokio::test]
    async fn raw_beats_stream() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions {
            raw: true,
            stream: true,
            ..Default::default()
        };
        let response = render_response(&envelope, &opts, None, None);
        let content_type = response.headers().get(axum::http::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("application/json"));
    }
}
