//! The self-describing router: classifies a request path into one of seven
//! [`RouteKind`] shapes.

use crate::function_call::{parse_function_call, ParsedFunctionCall};
use crate::identifier::Identifier;

/// The target of a [`RouteKind::Meta`] route: a collection or a single entity.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaTarget {
    /// `/contacts/$schema`
    Collection(String),
    /// `/contact_abc/$history`
    Entity(Identifier),
}

/// The seven structured shapes a path can classify into.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteKind {
    /// `/contacts`
    Collection {
        /// The collection name.
        collection: String,
    },
    /// `/contact_abc`
    Entity {
        /// The parsed identifier.
        entity: Identifier,
    },
    /// `/contact_abc/qualify`
    EntityAction {
        /// The parsed identifier.
        entity: Identifier,
        /// The verb segment, e.g. `qualify`.
        action: String,
    },
    /// `/contacts/create`
    CollectionAction {
        /// The collection name.
        collection: String,
        /// The verb segment, e.g. `create`.
        action: String,
    },
    /// `…/$schema`
    Meta {
        /// What the meta-resource reflects on.
        target: MetaTarget,
        /// The meta-resource name (without the leading `$`).
        name: String,
    },
    /// `/score(contact_abc)`
    FunctionCall {
        /// The parsed call.
        call: ParsedFunctionCall,
    },
    /// `/search?q=…`
    Search {
        /// The `q` query parameter, if present.
        query: Option<String>,
    },
    /// Anything that doesn't match the above.
    Unknown {
        /// The raw path that failed to classify.
        path: String,
    },
}

/// A classified request: the route kind plus the tenant and raw path every
/// route carries regardless of kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoute {
    /// The tenant slug stripped from a leading `/~slug/` segment, if any.
    pub tenant: Option<String>,
    /// The original, unmodified request target (path + query, if given).
    pub raw: String,
    /// The classified shape.
    pub kind: RouteKind,
}

/// Classify `target` (a path, optionally followed by `?query`) into a
/// [`ParsedRoute`].
///
/// The router is total (every input produces a route, `Unknown` at worst)
/// and side-effect-free: calling it twice on the same input yields equal
/// results. See §4.3 for the classification algorithm; ties are broken in
/// declaration order (function-call beats entity beats collection).
#[must_use]
pub fn classify(target: &str) -> ParsedRoute {
    let raw = target.to_string();
    let (path_part, query_part) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };

    let (tenant, rest) = strip_tenant(path_part);
    let trimmed = rest.trim_matches('/');

    if trimmed.contains('(') {
        if let Ok(call) = parse_function_call(trimmed) {
            return ParsedRoute {
                tenant,
                raw,
                kind: RouteKind::FunctionCall { call },
            };
        }
    }

    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    let kind = match segments.as_slice() {
        [] => RouteKind::Unknown { path: raw.clone() },
        [seg] if *seg == "search" => RouteKind::Search {
            query: extract_q(query_part),
        },
        [seg] => classify_single(seg),
        [x, y] => classify_pair(x, y),
        _ => RouteKind::Unknown { path: raw.clone() },
    };

    ParsedRoute { tenant, raw, kind }
}

fn classify_single(seg: &str) -> RouteKind {
    if let Ok(entity) = Identifier::parse(seg) {
        return RouteKind::Entity { entity };
    }
    if is_collection_name(seg) {
        return RouteKind::Collection {
            collection: seg.to_string(),
        };
    }
    RouteKind::Unknown {
        path: seg.to_string(),
    }
}

fn classify_pair(x: &str, y: &str) -> RouteKind {
    if let Some(meta_name) = y.strip_prefix('$') {
        let target = if let Ok(entity) = Identifier::parse(x) {
            MetaTarget::Entity(entity)
        } else {
            MetaTarget::Collection(x.to_string())
        };
        return RouteKind::Meta {
            target,
            name: meta_name.to_string(),
        };
    }

    if let Ok(entity) = Identifier::parse(x) {
        if is_plain_word(y) {
            return RouteKind::EntityAction {
                entity,
                action: y.to_string(),
            };
        }
    }

    RouteKind::CollectionAction {
        collection: x.to_string(),
        action: y.to_string(),
    }
}

fn is_collection_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_plain_word(s: &str) -> bool {
    is_collection_name(s)
}

/// Strip a leading `/~slug/` tenant segment; returns the slug (if any) and
/// the remaining path (leading slash preserved for uniform splitting).
fn strip_tenant(path: &str) -> (Option<String>, String) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if let Some(rest) = trimmed.strip_prefix('~') {
        if let Some((slug, remainder)) = rest.split_once('/') {
            if !slug.is_empty() {
                return (Some(slug.to_string()), format!("/{remainder}"));
            }
        } else if !rest.is_empty() {
            // `/~slug` with no trailing path segment.
            return (Some(rest.to_string()), String::new());
        }
    }
    (None, path.to_string())
}

fn extract_q(query: Option<&str>) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("q=") {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_collection() {
        let route = classify("/contacts");
        assert_eq!(
            route.kind,
            RouteKind::Collection {
                collection: "contacts".into()
            }
        );
    }

    #[test]
    fn classifies_entity() {
        let route = classify("/contact_abc");
        match route.kind {
            RouteKind::Entity { entity } => assert_eq!(entity.id, "contact_abc"),
            other => panic!("expected entity, got {other:?}"),
        }
    }

    #[test]
    fn classifies_entity_action() {
        let route = classify("/contact_abc/qualify");
        match route.kind {
            RouteKind::EntityAction { entity, action } => {
                assert_eq!(entity.id, "contact_abc");
                assert_eq!(action, "qualify");
            }
            other => panic!("expected entity-action, got {other:?}"),
        }
    }

    #[test]
    fn classifies_collection_action() {
        let route = classify("/contacts/create");
        assert_eq!(
            route.kind,
            RouteKind::CollectionAction {
                collection: "contacts".into(),
                action: "create".into()
            }
        );
    }

    #[test]
    fn classifies_meta_on_collection() {
        let route = classify("/contacts/$schema");
        match route.kind {
            RouteKind::Meta { target, name } => {
                assert_eq!(target, MetaTarget::Collection("contacts".into()));
                assert_eq!(name, "schema");
            }
            other => panic!("expected meta, got {other:?}"),
        }
    }

    #[test]
    fn classifies_meta_on_entity() {
        let route = classify("/contact_abc/$history");
        match route.kind {
            RouteKind::Meta { target, name } => {
                assert!(matches!(target, MetaTarget::Entity(_)));
                assert_eq!(name, "history");
            }
            other => panic!("expected meta, got {other:?}"),
        }
    }

    #[test]
    fn classifies_function_call() {
        let route = classify("/score(contact_abc)");
        match route.kind {
            RouteKind::FunctionCall { call } => assert_eq!(call.name, "score"),
            other => panic!("expected function-call, got {other:?}"),
        }
    }

    #[test]
    fn function_call_beats_entity_and_collection() {
        // Even though `score` alone would be a collection name, the `(`
        // short-circuits straight to function-call classification.
        let route = classify("/score()");
        assert!(matches!(route.kind, RouteKind::FunctionCall { .. }));
    }

    #[test]
    fn classifies_search_with_query() {
        let route = classify("/search?q=hello");
        assert_eq!(
            route.kind,
            RouteKind::Search {
                query: Some("hello".into())
            }
        );
    }

    #[test]
    fn classifies_search_without_query() {
        let route = classify("/search");
        assert_eq!(route.kind, RouteKind::Search { query: None });
    }

    #[test]
    fn classifies_unknown() {
        let route = classify("/contacts/create/extra/segments");
        assert!(matches!(route.kind, RouteKind::Unknown { .. }));
    }

    #[test]
    fn strips_tenant_prefix() {
        let route = classify("/~acme/contacts");
        assert_eq!(route.tenant, Some("acme".into()));
        assert_eq!(
            route.kind,
            RouteKind::Collection {
                collection: "contacts".into()
            }
        );
    }

    #[test]
    fn no_tenant_prefix_passes_through() {
        let route = classify("/contacts");
        assert_eq!(route.tenant, None);
    }

    #[test]
    fn router_is_deterministic() {
        let a = classify("/contact_abc/qualify");
        let b = classify("/contact_abc/qualify");
        assert_eq!(a, b);
    }

    #[test]
    fn raw_path_preserved() {
        let route = classify("/~acme/contacts?limit=5");
        assert_eq!(route.raw, "/~acme/contacts?limit=5");
    }
}
