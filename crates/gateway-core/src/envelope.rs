//! The ordered JSON response envelope (§3, §4.11) and its response-mode
//! transforms (§4.12): `?raw`, `?debug`, `?domains`, `?format=md`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// The canonical response envelope.
///
/// Keys are inserted in a fixed order regardless of which setter ran first
/// — [`Self::to_ordered_value`] is the only place that order is decided,
/// relying on `serde_json`'s `preserve_order` feature so the wire order
/// matches it. `api` is always first; `user` is always last when present.
/// Any field left unset by its setter is simply omitted, not nulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    api: Value,
    context: Option<Value>,
    type_: Option<String>,
    id: Option<String>,
    links: Value,
    semantic: Option<(String, Value)>,
    discover: Option<Value>,
    total: Option<u64>,
    limit: Option<u64>,
    offset: Option<u64>,
    page: Option<u64>,
    has_more: Option<bool>,
    actions: Option<Value>,
    options: Option<Value>,
    recent: Option<Value>,
    meta: Option<Value>,
    debug: Option<Value>,
    error: Option<Value>,
    user: Option<Value>,
}

impl Envelope {
    /// Start a fresh envelope. `api` is the `{name, type, version,
    /// description}` block every response carries first; `links` defaults
    /// to an empty object (always present per §3).
    #[must_use]
    pub fn new(api: Value) -> Self {
        Self {
            api,
            context: None,
            type_: None,
            id: None,
            links: Value::Object(Map::new()),
            semantic: None,
            discover: None,
            total: None,
            limit: None,
            offset: None,
            page: None,
            has_more: None,
            actions: None,
            options: None,
            recent: None,
            meta: None,
            debug: None,
            error: None,
            user: None,
        }
    }

    /// An error envelope: `api` plus the rendered [`crate::GatewayError`]
    /// body under `error`. Callers should also attach `links.home`/
    /// `links.status` (§7) via [`Self::with_links`].
    #[must_use]
    pub fn error(api: Value, error_value: Value) -> Self {
        Self {
            error: Some(error_value),
            ..Self::new(api)
        }
    }

    /// Set `$context`.
    #[must_use]
    pub fn with_context(mut self, value: Value) -> Self {
        self.context = Some(value);
        self
    }

    /// Set `$type`.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_ = Some(type_name.into());
        self
    }

    /// Set `$id`.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replace `links` (defaults to `{}`).
    #[must_use]
    pub fn with_links(mut self, links: Value) -> Self {
        self.links = links;
        self
    }

    /// Set the semantic payload under a caller-chosen key — e.g. a
    /// collection of contacts lives under `"contacts"`, a mutation preview
    /// lives under `"confirm"`. Omitted entirely for purely discoverable
    /// responses (a landing page with no single payload).
    #[must_use]
    pub fn with_semantic(mut self, key: impl Into<String>, value: Value) -> Self {
        self.semantic = Some((key.into(), value));
        self
    }

    /// Set `discover`.
    #[must_use]
    pub fn with_discover(mut self, value: Value) -> Self {
        self.discover = Some(value);
        self
    }

    /// Set the pagination block: `total`, `limit`, `offset`, `page`,
    /// `hasMore`. Each is carried independently and only rendered if
    /// `Some`.
    #[must_use]
    pub fn with_page_info(
        mut self,
        total: Option<u64>,
        limit: Option<u64>,
        offset: Option<u64>,
        page: Option<u64>,
        has_more: Option<bool>,
    ) -> Self {
        self.total = total;
        self.limit = limit;
        self.offset = offset;
        self.page = page;
        self.has_more = has_more;
        self
    }

    /// Set `actions`.
    #[must_use]
    pub fn with_actions(mut self, value: Value) -> Self {
        self.actions = Some(value);
        self
    }

    /// Set `options`.
    #[must_use]
    pub fn with_options(mut self, value: Value) -> Self {
        self.options = Some(value);
        self
    }

    /// Set `recent`.
    #[must_use]
    pub fn with_recent(mut self, value: Value) -> Self {
        self.recent = Some(value);
        self
    }

    /// Set `meta`.
    #[must_use]
    pub fn with_meta(mut self, value: Value) -> Self {
        self.meta = Some(value);
        self
    }

    /// Set `user` (always rendered last).
    #[must_use]
    pub fn with_user(mut self, value: Value) -> Self {
        self.user = Some(value);
        self
    }

    /// The semantic payload's value, if one was set — used by `?raw`.
    #[must_use]
    pub fn semantic_value(&self) -> Option<&Value> {
        self.semantic.as_ref().map(|(_, v)| v)
    }

    /// The rendered `error` body, if this is an error envelope.
    #[must_use]
    pub fn error_value(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    /// Render the envelope as an ordered JSON object, in the fixed key
    /// order from §3: `api`, `$context`, `$type`, `$id`, `links`,
    /// `<semantic key>`, `discover`, `total`, `limit`, `offset`, `page`,
    /// `hasMore`, `actions`, `options`, `recent`, `meta`, `debug`, `error`,
    /// `user`. Absent fields are omitted, not nulled.
    #[must_use]
    pub fn to_ordered_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("api".to_string(), self.api.clone());
        if let Some(context) = &self.context {
            map.insert("$context".to_string(), context.clone());
        }
        if let Some(type_) = &self.type_ {
            map.insert("$type".to_string(), Value::String(type_.clone()));
        }
        if let Some(id) = &self.id {
            map.insert("$id".to_string(), Value::String(id.clone()));
        }
        map.insert("links".to_string(), self.links.clone());
        if let Some((key, value)) = &self.semantic {
            map.insert(key.clone(), value.clone());
        }
        if let Some(discover) = &self.discover {
            map.insert("discover".to_string(), discover.clone());
        }
        if let Some(total) = self.total {
            map.insert("total".to_string(), Value::from(total));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".to_string(), Value::from(limit));
        }
        if let Some(offset) = self.offset {
            map.insert("offset".to_string(), Value::from(offset));
        }
        if let Some(page) = self.page {
            map.insert("page".to_string(), Value::from(page));
        }
        if let Some(has_more) = self.has_more {
            map.insert("hasMore".to_string(), Value::Bool(has_more));
        }
        if let Some(actions) = &self.actions {
            map.insert("actions".to_string(), actions.clone());
        }
        if let Some(options) = &self.options {
            map.insert("options".to_string(), options.clone());
        }
        if let Some(recent) = &self.recent {
            map.insert("recent".to_string(), recent.clone());
        }
        if let Some(meta) = &self.meta {
            map.insert("meta".to_string(), meta.clone());
        }
        if let Some(debug) = &self.debug {
            map.insert("debug".to_string(), debug.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), error.clone());
        }
        if let Some(user) = &self.user {
            map.insert("user".to_string(), user.clone());
        }
        Value::Object(map)
    }
}

/// Which response-mode transforms a request asked for, via `?raw`,
/// `?debug`, `?domains`, `?format=md`, and `?array` query flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RespondOptions {
    /// `?raw` — strip the envelope and return the bare semantic payload
    /// (or the error object directly, on errors).
    pub raw: bool,
    /// `?debug` — attach a `debug` block with request timing.
    pub debug: bool,
    /// `?domains` — rewrite `links`/`actions`/`options` URLs from path
    /// style to subdomain style.
    pub domains: bool,
    /// `?format=md` — render the final JSON as Markdown instead.
    pub markdown: bool,
    /// `?array` — render a collection as a structured array instead of a
    /// `name → url` map (read by the convention building the semantic
    /// payload, not by the envelope transforms themselves).
    pub array: bool,
    /// `?stream` — emit Server-Sent Events instead of a single JSON body
    /// (read by the transport layer, which picks an entirely different
    /// render path rather than post-processing the envelope).
    pub stream: bool,
}

/// How to rewrite a path-style URL into subdomain style for `?domains`
/// (§4.12): `https://{host}/{segment}/…` → `https://{segment}.{suffix}/…`,
/// with per-segment overrides and tenant-prefixed paths left untouched.
#[derive(Debug, Clone, Default)]
pub struct DomainRewriteConfig {
    /// The base suffix subdomains are built against, e.g. `"example.com"`.
    pub suffix: String,
    /// `segment → subdomain` overrides (when the subdomain differs from
    /// the path segment itself).
    pub overrides: BTreeMap<String, String>,
}

impl DomainRewriteConfig {
    fn subdomain_for(&self, segment: &str) -> String {
        self.overrides.get(segment).cloned().unwrap_or_else(|| segment.to_string())
    }
}

/// Apply the response-mode transforms to `envelope`, in the fixed
/// precedence order from §4.12: `raw` wins outright (nothing else applies
/// once the envelope has been unwrapped); otherwise `domains` reshapes
/// `links`/`actions`/`options`, and `debug` attaches `debug_block`.
#[must_use]
pub fn apply_transforms(
    envelope: &Envelope,
    opts: &RespondOptions,
    debug_block: Option<Value>,
    domain_cfg: Option<&DomainRewriteConfig>,
) -> Value {
    if opts.raw {
        if let Some(error) = envelope.error_value() {
            return error.clone();
        }
        return envelope.semantic_value().cloned().unwrap_or(Value::Null);
    }

    let mut result = envelope.clone();
    if opts.domains {
        if let Some(cfg) = domain_cfg {
            result.links = rewrite_domain_urls(&result.links, cfg);
            result.actions = result.actions.as_ref().map(|v| rewrite_domain_urls(v, cfg));
            result.options = result.options.as_ref().map(|v| rewrite_domain_urls(v, cfg));
        }
    }
    if opts.debug {
        result.debug = debug_block.or(result.debug);
    }

    result.to_ordered_value()
}

/// Recursively rewrite every `http(s)://` string leaf found in `value`.
fn rewrite_domain_urls(value: &Value, cfg: &DomainRewriteConfig) -> Value {
    match value {
        Value::String(s) => Value::String(rewrite_domain_url(s, cfg)),
        Value::Array(items) => Value::Array(items.iter().map(|v| rewrite_domain_urls(v, cfg)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), rewrite_domain_urls(v, cfg))).collect())
        }
        other => other.clone(),
    }
}

/// Rewrite a single URL from path style to subdomain style, per §4.12.
/// Leaves anything that isn't an `http(s)://host/segment/…` URL, or whose
/// path is tenant-prefixed (`/~tenant/…`), unchanged.
fn rewrite_domain_url(url: &str, cfg: &DomainRewriteConfig) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((_host, path)) = rest.split_once('/') else {
        return url.to_string();
    };
    if path.starts_with('~') {
        return url.to_string();
    }
    let (segment, remainder) = path.split_once('/').unwrap_or((path, ""));
    if segment.is_empty() {
        return url.to_string();
    }
    let subdomain = cfg.subdomain_for(segment);
    if remainder.is_empty() {
        format!("{scheme}://{subdomain}.{}", cfg.suffix)
    } else {
        format!("{scheme}://{subdomain}.{}/{remainder}", cfg.suffix)
    }
}

/// Render a final JSON value as Markdown for `?format=md` (§4.12): an
/// `# {api.name}` heading, a `> {total} total` line when `total` was set,
/// a pipe table of a flat-object array (or a fenced JSON block for
/// anything else), then `## Links` and `## Actions` sections.
#[must_use]
pub fn render_markdown(value: &Value) -> String {
    let mut out = String::new();

    let heading = value
        .get("api")
        .and_then(|api| api.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("API");
    out.push_str(&format!("# {heading}\n\n"));

    if let Some(total) = value.get("total").and_then(Value::as_u64) {
        out.push_str(&format!("> {total} total\n\n"));
    }

    out.push_str(&render_payload_body(value));

    if let Some(links) = value.get("links").and_then(Value::as_object) {
        if !links.is_empty() {
            out.push_str("\n\n## Links\n\n");
            out.push_str(&render_link_list(links));
        }
    }
    if let Some(actions) = value.get("actions").and_then(Value::as_object) {
        if !actions.is_empty() {
            out.push_str("\n\n## Actions\n\n");
            out.push_str(&render_link_list(actions));
        }
    }

    out
}

fn render_link_list(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(name, target)| format!("- [{name}]({})", target.as_str().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_payload_body(value: &Value) -> String {
    const ENVELOPE_KEYS: &[&str] = &[
        "api", "$context", "$type", "$id", "links", "discover", "total", "limit", "offset",
        "page", "hasMore", "actions", "options", "recent", "meta", "debug", "error", "user",
    ];
    let payload = value.as_object().and_then(|map| {
        map.iter()
            .find(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
            .map(|(_, v)| v)
    });
    let Some(payload) = payload else {
        return String::new();
    };

    if let Value::Array(items) = payload {
        if let Some(columns) = flat_table_columns(items) {
            return render_table(&columns, items);
        }
    }
    let pretty = serde_json::to_string_pretty(payload).unwrap_or_default();
    format!("```json\n{pretty}\n```")
}

fn flat_table_columns(items: &[Value]) -> Option<Vec<String>> {
    if items.is_empty() {
        return None;
    }
    let first = items.first()?.as_object()?;
    let columns: Vec<String> = first.keys().cloned().collect();
    let all_flat_objects = items.iter().all(|item| {
        item.as_object()
            .is_some_and(|obj| obj.values().all(|v| !v.is_object() && !v.is_array()))
    });
    if all_flat_objects {
        Some(columns)
    } else {
        None
    }
}

fn render_table(columns: &[String], items: &[Value]) -> String {
    let header = format!("| {} |", columns.join(" | "));
    let divider = format!("| {} |", columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    let mut rows = vec![header, divider];
    for item in items {
        let cells: Vec<String> = columns.iter().map(|col| cell_text(item.get(col))).collect();
        rows.push(format!("| {} |", cells.join(" | ")));
    }
    rows.join("\n")
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> Value {
        serde_json::json!({"name": "acme-gateway", "type": "crud", "version": "1.0", "description": "d"})
    }

    #[test]
    fn key_order_is_fixed_and_api_first_user_last() {
        let envelope = Envelope::new(api())
            .with_semantic("contact", serde_json::json!({"id": 1}))
            .with_type("contact")
            .with_user(serde_json::json!({"id": "u1"}));
        let value = envelope.to_ordered_value();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.first().unwrap().as_str(), "api");
        assert_eq!(keys.last().unwrap().as_str(), "user");
        assert_eq!(keys, vec!["api", "$type", "links", "contact", "user"]);
    }

    #[test]
    fn semantic_key_is_configurable() {
        let envelope = Envelope::new(api()).with_semantic("contacts", serde_json::json!([]));
        let value = envelope.to_ordered_value();
        assert!(value.get("contacts").is_some());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn raw_strips_envelope_to_semantic_payload() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions { raw: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, None, None);
        assert_eq!(result, serde_json::json!({"id": 1}));
    }

    #[test]
    fn raw_emits_error_object_directly() {
        let envelope = Envelope::error(api(), serde_json::json!({"code": "NOT_FOUND"}));
        let opts = RespondOptions { raw: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, None, None);
        assert_eq!(result, serde_json::json!({"code": "NOT_FOUND"}));
    }

    #[test]
    fn raw_wins_over_domains_and_debug() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions {
            raw: true,
            domains: true,
            debug: true,
            ..Default::default()
        };
        let result = apply_transforms(&envelope, &opts, Some(serde_json::json!({"x": 1})), None);
        assert_eq!(result, serde_json::json!({"id": 1}));
    }

    #[test]
    fn debug_attaches_block() {
        let envelope = Envelope::new(api()).with_semantic("contact", serde_json::json!({"id": 1}));
        let opts = RespondOptions { debug: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, Some(serde_json::json!({"timing": {"duration": 5}})), None);
        assert_eq!(result.get("debug").unwrap().get("timing").unwrap().get("duration"), Some(&Value::from(5)));
    }

    #[test]
    fn domains_rewrites_path_style_links() {
        let envelope = Envelope::new(api()).with_links(serde_json::json!({
            "collection": "https://gateway.example.com/contacts",
            "self": "https://gateway.example.com/contacts/create",
        }));
        let cfg = DomainRewriteConfig {
            suffix: "example.com".to_string(),
            overrides: BTreeMap::new(),
        };
        let opts = RespondOptions { domains: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, None, Some(&cfg));
        assert_eq!(result["links"]["collection"], "https://contacts.example.com");
        assert_eq!(result["links"]["self"], "https://contacts.example.com/create");
    }

    #[test]
    fn domains_skips_tenant_prefixed_paths() {
        let envelope = Envelope::new(api())
            .with_links(serde_json::json!({"collection": "https://gateway.example.com/~acme/contacts"}));
        let cfg = DomainRewriteConfig {
            suffix: "example.com".to_string(),
            overrides: BTreeMap::new(),
        };
        let opts = RespondOptions { domains: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, None, Some(&cfg));
        assert_eq!(result["links"]["collection"], "https://gateway.example.com/~acme/contacts");
    }

    #[test]
    fn domains_applies_segment_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("contacts".to_string(), "crm".to_string());
        let cfg = DomainRewriteConfig {
            suffix: "example.com".to_string(),
            overrides,
        };
        let envelope =
            Envelope::new(api()).with_links(serde_json::json!({"collection": "https://gateway.example.com/contacts"}));
        let opts = RespondOptions { domains: true, ..Default::default() };
        let result = apply_transforms(&envelope, &opts, None, Some(&cfg));
        assert_eq!(result["links"]["collection"], "https://crm.example.com");
    }

    #[test]
    fn error_envelope_has_error_key_not_semantic() {
        let envelope = Envelope::error(api(), serde_json::json!({"code": "NOT_FOUND"}));
        let value = envelope.to_ordered_value();
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn markdown_renders_flat_array_as_table_with_heading() {
        let envelope = Envelope::new(api())
            .with_semantic("contacts", serde_json::json!([{"name": "Ada", "age": 36}]))
            .with_page_info(Some(1), None, None, None, None);
        let value = apply_transforms(&envelope, &RespondOptions::default(), None, None);
        let md = render_markdown(&value);
        assert!(md.starts_with("# acme-gateway"));
        assert!(md.contains("> 1 total"));
        assert!(md.contains("| name | age |"));
    }

    #[test]
    fn markdown_includes_links_section() {
        let envelope = Envelope::new(api())
            .with_links(serde_json::json!({"collection": "https://x/contacts"}))
            .with_semantic("contact", serde_json::json!({"id": 1}));
        let value = apply_transforms(&envelope, &RespondOptions::default(), None, None);
        let md = render_markdown(&value);
        assert!(md.contains("## Links"));
        assert!(md.contains("[collection](https://x/contacts)"));
    }
}
