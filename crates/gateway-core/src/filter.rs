//! MongoDB-style query filters: `field[$op]=value` → `{field: {$op: value}}`.

use std::collections::BTreeMap;
use std::fmt;

/// A single comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterOp {
    /// `$eq`
    Eq,
    /// `$ne`
    Ne,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$in`
    In,
    /// `$nin`
    Nin,
    /// `$exists`
    Exists,
    /// `$regex`
    Regex,
}

impl FilterOp {
    /// Parse the bracketed operator name (without the leading `$`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "in" => FilterOp::In,
            "nin" => FilterOp::Nin,
            "exists" => FilterOp::Exists,
            "regex" => FilterOp::Regex,
            _ => return None,
        })
    }

    /// The canonical `$op` spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::In => "$in",
            FilterOp::Nin => "$nin",
            FilterOp::Exists => "$exists",
            FilterOp::Regex => "$regex",
        }
    }
}

/// A coerced filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// A purely numeric value.
    Number(f64),
    /// Anything else, verbatim.
    Str(String),
    /// The comma-split operand of `$in` / `$nin`.
    List(Vec<FilterValue>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Null => write!(f, "null"),
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::Str(s) => write!(f, "{s}"),
            FilterValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Coerce a raw query-string operand per §4.6: `true`/`false` → bool,
/// `null` → null, purely numeric → number, else string.
#[must_use]
pub fn coerce(raw: &str) -> FilterValue {
    match raw {
        "true" => FilterValue::Bool(true),
        "false" => FilterValue::Bool(false),
        "null" => FilterValue::Null,
        _ => {
            if let Ok(n) = raw.parse::<f64>() {
                if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+') {
                    return FilterValue::Number(n);
                }
            }
            FilterValue::Str(raw.to_string())
        }
    }
}

fn coerce_operand(op: FilterOp, raw: &str) -> FilterValue {
    match op {
        FilterOp::In | FilterOp::Nin => {
            FilterValue::List(raw.split(',').map(coerce).collect())
        }
        _ => coerce(raw),
    }
}

type Conditions = BTreeMap<String, Vec<(FilterOp, FilterValue)>>;

/// A query filter: either a flat, implicitly-ANDed set of per-field
/// conditions, or a logical combination of nested filters (§4.6). Query
/// strings parsed by [`parse_filters`] only ever produce [`Filter::Leaf`];
/// `$or`/`$and`/`$not`/`$nor` are assembled programmatically by a framework
/// caller that wants to combine filters beyond what a single query string
/// can express.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A flat set of per-field conditions, implicitly ANDed.
    Leaf(Conditions),
    /// `$and`: every nested filter must match.
    And(Vec<Filter>),
    /// `$or`: at least one nested filter must match.
    Or(Vec<Filter>),
    /// `$not`: the nested filter must not match.
    Not(Box<Filter>),
    /// `$nor`: none of the nested filters may match.
    Nor(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Leaf(BTreeMap::new())
    }
}

impl Filter {
    /// An empty leaf filter (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `$and` of the given filters.
    #[must_use]
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// `$or` of the given filters.
    #[must_use]
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// `$not` of a single filter.
    #[must_use]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// `$nor` of the given filters.
    #[must_use]
    pub fn nor(filters: Vec<Filter>) -> Self {
        Filter::Nor(filters)
    }

    /// Add a condition for `field`. A no-op on a logical-combinator
    /// filter; only [`Filter::Leaf`] accumulates conditions this way.
    pub fn push(&mut self, field: &str, op: FilterOp, value: FilterValue) {
        if let Filter::Leaf(fields) = self {
            fields.entry(field.to_string()).or_default().push((op, value));
        }
    }

    /// Iterate this filter's top-level field conditions in sorted order.
    /// Empty for a logical-combinator filter — use the recursive
    /// accessors (`matches`, `canonicalize`) to inspect those.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, &[(FilterOp, FilterValue)])> + '_> {
        match self {
            Filter::Leaf(fields) => Box::new(fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))),
            Filter::And(_) | Filter::Or(_) | Filter::Not(_) | Filter::Nor(_) => Box::new(std::iter::empty()),
        }
    }

    /// `true` for an empty leaf filter. A logical-combinator filter is
    /// never empty — it was explicitly constructed to combine something.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::Leaf(fields) if fields.is_empty())
    }

    /// Re-emit as a canonical query-string-like form: a leaf's fields are
    /// sorted lexically with operators sorted by [`FilterOp`] declaration
    /// order; a logical combinator recurses over its children the same
    /// way. Reparsing a leaf's canonical form reproduces the same
    /// [`Filter`] — the basis of the idempotency law in §8.
    #[must_use]
    pub fn canonicalize(&self) -> String {
        match self {
            Filter::Leaf(fields) => {
                let mut parts = Vec::new();
                for (field, conditions) in fields {
                    let mut sorted = conditions.clone();
                    sorted.sort_by_key(|(op, _)| *op);
                    for (op, value) in sorted {
                        parts.push(format!("{field}[{}]={value}", op.as_str()));
                    }
                }
                parts.join("&")
            }
            Filter::And(children) => canonicalize_group("$and", children),
            Filter::Or(children) => canonicalize_group("$or", children),
            Filter::Nor(children) => canonicalize_group("$nor", children),
            Filter::Not(inner) => format!("$not({})", inner.canonicalize()),
        }
    }

    /// Evaluate this filter against a JSON document (client-side matching,
    /// used when the upstream store can't evaluate the filter itself).
    /// Logical combinators recurse: `$and` requires every child to match,
    /// `$or` requires at least one, `$not` negates its single child, and
    /// `$nor` requires none of its children to match.
    #[must_use]
    pub fn matches(&self, doc: &serde_json::Value) -> bool {
        match self {
            Filter::Leaf(fields) => fields.iter().all(|(field, conditions)| {
                let actual = doc.get(field);
                conditions.iter().all(|(op, expected)| match_one(*op, actual, expected))
            }),
            Filter::And(children) => children.iter().all(|f| f.matches(doc)),
            Filter::Or(children) => children.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
            Filter::Nor(children) => !children.iter().any(|f| f.matches(doc)),
        }
    }
}

fn canonicalize_group(op: &str, children: &[Filter]) -> String {
    let parts: Vec<String> = children.iter().map(Filter::canonicalize).collect();
    format!("{op}({})", parts.join(";"))
}

fn match_one(op: FilterOp, actual: Option<&serde_json::Value>, expected: &FilterValue) -> bool {
    match op {
        FilterOp::Exists => {
            let should_exist = matches!(expected, FilterValue::Bool(true));
            actual.is_some() == should_exist
        }
        FilterOp::In => match expected {
            FilterValue::List(items) => items.iter().any(|v| value_eq(actual, v)),
            _ => false,
        },
        FilterOp::Nin => match expected {
            FilterValue::List(items) => !items.iter().any(|v| value_eq(actual, v)),
            _ => true,
        },
        FilterOp::Eq => value_eq(actual, expected),
        FilterOp::Ne => !value_eq(actual, expected),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            compare(op, actual, expected)
        }
        FilterOp::Regex => match (actual, expected) {
            (Some(serde_json::Value::String(s)), FilterValue::Str(pattern)) => s.contains(pattern.as_str()),
            _ => false,
        },
    }
}

fn value_eq(actual: Option<&serde_json::Value>, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (Some(serde_json::Value::Bool(a)), FilterValue::Bool(b)) => a == b,
        (Some(serde_json::Value::Null) | None, FilterValue::Null) => true,
        (Some(serde_json::Value::Number(a)), FilterValue::Number(b)) => {
            a.as_f64().is_some_and(|a| (a - b).abs() < f64::EPSILON)
        }
        (Some(serde_json::Value::String(a)), FilterValue::Str(b)) => a == b,
        _ => false,
    }
}

fn compare(op: FilterOp, actual: Option<&serde_json::Value>, expected: &FilterValue) -> bool {
    let (Some(serde_json::Value::Number(a)), FilterValue::Number(b)) = (actual, expected) else {
        return false;
    };
    let Some(a) = a.as_f64() else { return false };
    match op {
        FilterOp::Gt => a > *b,
        FilterOp::Gte => a >= *b,
        FilterOp::Lt => a < *b,
        FilterOp::Lte => a <= *b,
        _ => unreachable!(),
    }
}

/// Parse MongoDB-style filters out of a query string (already stripped of
/// its leading `?`). Keys of the form `field[$op]=value` become typed
/// conditions; a bare `field=value` is treated as an implicit `$eq`.
/// Unknown operators and reserved keys (`limit`, `offset`, `sort`, `since`,
/// `after`, `before`, `confirm`, `q`) are ignored.
#[must_use]
pub fn parse_filters(query: &str) -> Filter {
    const RESERVED: &[&str] = &[
        "limit", "offset", "sort", "since", "after", "before", "confirm", "q", "array", "raw",
        "debug", "domains", "stream", "format",
    ];

    let mut filter = Filter::new();
    if query.is_empty() {
        return filter;
    }

    for pair in query.split('&') {
        let Some((raw_key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        let key = percent_decode(raw_key);
        let value = percent_decode(raw_value);

        if let Some(bracket) = key.find('[') {
            if let Some(close) = key.find(']') {
                if close > bracket {
                    let field = &key[..bracket];
                    let op_name = key[bracket + 1..close].trim_start_matches('$');
                    if let Some(op) = FilterOp::parse(op_name) {
                        filter.push(field, op, coerce_operand(op, &value));
                        continue;
                    }
                }
            }
            continue;
        }

        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        filter.push(&key, FilterOp::Eq, coerce(&value));
    }

    filter
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}
