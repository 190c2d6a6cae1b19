//! Entity identifier parsing: `type_sqid` ↔ `{type, collection, id, sqid}`.

use std::fmt;

/// A parsed entity identifier of the form `<type>_<sqid>`.
///
/// `type` is a lowercase-leading camelCase word; `collection` is derived
/// from it by [`pluralize`]. `id` is the original input, `sqid` the segment
/// after the first underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    /// The singular camelCase model name, e.g. `contact`, `featureFlag`.
    pub type_name: String,
    /// The pluralized collection name, e.g. `contacts`, `featureFlags`.
    pub collection: String,
    /// The full identifier as given, e.g. `contact_kRziM`.
    pub id: String,
    /// The sqid segment, e.g. `kRziM`.
    pub sqid: String,
}

/// Why a candidate string failed [`Identifier::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierParseError {
    /// The input was empty.
    #[error("identifier is empty")]
    Empty,
    /// The input started with `$` (a meta-resource marker) or `~` (a tenant marker).
    #[error("identifier starts with a reserved prefix")]
    ReservedPrefix,
    /// The input contains `(`, which marks a function-call segment.
    #[error("identifier contains '(' and is not an entity id")]
    ContainsParen,
    /// The input does not match `^[a-z][a-zA-Z]*_[a-zA-Z0-9]+$`.
    #[error("identifier does not match the type_sqid grammar")]
    GrammarMismatch,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl Identifier {
    /// Parse a candidate path segment as an entity identifier.
    ///
    /// Rejects empty strings, anything starting with `$` or `~`, anything
    /// containing `(`, anything whose first letter is uppercase, and
    /// anything not matching `^[a-z][a-zA-Z]*_[a-zA-Z0-9]+$`.
    pub fn parse(candidate: &str) -> Result<Self, IdentifierParseError> {
        if candidate.is_empty() {
            return Err(IdentifierParseError::Empty);
        }
        if candidate.starts_with('$') || candidate.starts_with('~') {
            return Err(IdentifierParseError::ReservedPrefix);
        }
        if candidate.contains('(') {
            return Err(IdentifierParseError::ContainsParen);
        }

        let Some(underscore) = candidate.find('_') else {
            return Err(IdentifierParseError::GrammarMismatch);
        };
        let (type_name, rest) = candidate.split_at(underscore);
        let sqid = &rest[1..];

        if !is_camel_type(type_name) || sqid.is_empty() || !sqid.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(IdentifierParseError::GrammarMismatch);
        }

        Ok(Identifier {
            type_name: type_name.to_string(),
            collection: pluralize(type_name),
            id: candidate.to_string(),
            sqid: sqid.to_string(),
        })
    }

    /// `true` if `candidate` would parse successfully as an identifier.
    #[must_use]
    pub fn matches(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }
}

/// `^[a-z][a-zA-Z]*$`
fn is_camel_type(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphabetic())
}

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'A', 'E', 'I', 'O', 'U'];

/// Pluralize a camelCase, lowercase-leading model name.
///
/// Rules, in order:
/// - ends in `y` not preceded by a vowel → `-y` + `ies` (e.g. `survey` is
///   preceded by a vowel so it takes the default `+s` branch: `surveys`)
/// - ends in `s`, `x`, or `z` → `+es`
/// - ends in `ch` or `sh` → `+es`
/// - ends in `ey`, `ay`, `oy`, or `uy` → `+s`
/// - otherwise → `+s`
///
/// The pluralizer is total: every input matching the identifier grammar's
/// type alphabet produces a collection name.
#[must_use]
pub fn pluralize(type_name: &str) -> String {
    if type_name.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = type_name.chars().collect();
    let last = chars[chars.len() - 1];
    let second_last = if chars.len() >= 2 {
        Some(chars[chars.len() - 2])
    } else {
        None
    };

    // `-ey/-ay/-oy/-uy` → `+s` (checked before the general `-y` rule).
    if last == 'y' {
        if let Some(prev) = second_last {
            if VOWELS.contains(&prev) {
                return format!("{type_name}s");
            }
        }
        // `-y → -ies` (not preceded by a vowel).
        let mut stem = type_name.to_string();
        stem.pop();
        return format!("{stem}ies");
    }

    if last == 's' || last == 'x' || last == 'z' {
        return format!("{type_name}es");
    }

    if chars.len() >= 2 {
        let tail: String = chars[chars.len() - 2..].iter().collect();
        if tail == "ch" || tail == "sh" {
            return format!("{type_name}es");
        }
    }

    format!("{type_name}s")
}
