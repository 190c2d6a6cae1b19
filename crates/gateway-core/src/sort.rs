//! Comma-separated sort specs: `field,-field2` → ordered, directional keys.

use std::fmt;

/// One field in a sort spec, with its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// The field name, without the leading `-`.
    pub field: String,
    /// `true` for descending (a leading `-`), `false` for ascending.
    pub descending: bool,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            write!(f, "{}", self.field)
        }
    }
}

/// A parsed, ordered sequence of sort keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Parse a `sort=` query value: comma-separated field names, each
    /// optionally prefixed with `-` for descending. Blank segments
    /// (leading/trailing/doubled commas) are skipped. A bare `-` with no
    /// field name is dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|segment| {
                let (descending, field) = match segment.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, segment),
                };
                if field.is_empty() {
                    None
                } else {
                    Some(SortKey {
                        field: field.to_string(),
                        descending,
                    })
                }
            })
            .collect();
        Self { keys }
    }

    /// The parsed keys, in the order they were given — first key is the
    /// primary sort.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// `true` if no fields were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Canonical re-serialization, e.g. `name,-createdAt`. Reparsing this
    /// string reproduces the same [`SortSpec`].
    #[must_use]
    pub fn canonicalize(&self) -> String {
        self.keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Compare two JSON documents by this spec's keys in order, falling
    /// through to the next key on ties. Missing fields sort before present
    /// ones regardless of direction.
    #[must_use]
    pub fn compare(&self, a: &serde_json::Value, b: &serde_json::Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for key in &self.keys {
            let ordering = compare_field(a.get(&key.field), b.get(&key.field));
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_field(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ascending_and_descending() {
        let spec = SortSpec::parse("name,-createdAt");
        assert_eq!(
            spec.keys(),
            &[
                SortKey {
                    field: "name".into(),
                    descending: false
                },
                SortKey {
                    field: "createdAt".into(),
                    descending: true
                }
            ]
        );
    }

    #[test]
    fn skips_blank_segments() {
        let spec = SortSpec::parse("name,,-");
        assert_eq!(
            spec.keys(),
            &[SortKey {
                field: "name".into(),
                descending: false
            }]
        );
    }

    #[test]
    fn empty_input_is_empty_spec() {
        assert!(SortSpec::parse("").is_empty());
    }

    #[test]
    fn canonicalize_round_trips() {
        let spec = SortSpec::parse("name,-createdAt");
        let once = spec.canonicalize();
        let twice = SortSpec::parse(&once).canonicalize();
        assert_eq!(once, twice);
        assert_eq!(once, "name,-createdAt");
    }

    #[test]
    fn compare_respects_direction_and_tiebreak() {
        let spec = SortSpec::parse("-score,name");
        let a = serde_json::json!({"score": 5, "name": "b"});
        let b = serde_json::json!({"score": 5, "name": "a"});
        assert_eq!(spec.compare(&a, &b), std::cmp::Ordering::Greater);
    }

    #[test]
    fn missing_field_sorts_first() {
        let spec = SortSpec::parse("score");
        let a = serde_json::json!({});
        let b = serde_json::json!({"score": 1});
        assert_eq!(spec.compare(&a, &b), std::cmp::Ordering::Less);
    }
}
