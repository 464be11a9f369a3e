//! Field path parsing.
//!
//! A field path is a dot separated list of segments with an optional
//! `:modifier` on the last one:
//!
//! ```text
//! title
//! author.profile.name:lower
//! comments_via_post.message
//! @request.auth.id
//! @request.body.tags:each
//! @collection.users:u.email
//! ```

use std::fmt;
use std::str::FromStr;

use super::error::{ResolveError, ResolveResult};

/// Prefix of request paths.
pub const REQUEST_PREFIX: &str = "@request";
/// Prefix of ad-hoc collection paths.
pub const COLLECTION_PREFIX: &str = "@collection";

/// Columns that resolve directly against the base table.
const STATIC_FIELDS: [&str; 3] = ["id", "created", "updated"];

/// A path modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Lowercase the resolved value.
    Lower,
    /// Whether the request value was submitted.
    Isset,
    /// Whether the submitted value differs from the stored one.
    Changed,
    /// Match against each element of a multi-valued field.
    Each,
    /// Number of elements of a multi-valued field.
    Length,
}

impl FromStr for Modifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lower" => Ok(Modifier::Lower),
            "isset" => Ok(Modifier::Isset),
            "changed" => Ok(Modifier::Changed),
            "each" => Ok(Modifier::Each),
            "length" => Ok(Modifier::Length),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Lower => "lower",
            Modifier::Isset => "isset",
            Modifier::Changed => "changed",
            Modifier::Each => "each",
            Modifier::Length => "length",
        };
        f.write_str(name)
    }
}

/// Where a path starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathHead {
    /// `id`, `created` or `updated` of the base collection.
    Static(String),
    /// `@request.*`.
    Request,
    /// `@collection.<name>[:<alias>].*`.
    Collection { name: String, alias: Option<String> },
    /// A field of the base collection.
    Schema,
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The path as written.
    pub raw: String,
    /// Where the path starts.
    pub head: PathHead,
    /// Segments after the head, modifier stripped.
    pub segments: Vec<String>,
    /// Modifier of the last segment.
    pub modifier: Option<Modifier>,
}

impl FieldPath {
    /// Parse a field path.
    pub fn parse(raw: &str) -> ResolveResult<Self> {
        let invalid = |reason: &str| ResolveError::invalid_format(raw, reason);

        if raw.trim().is_empty() {
            return Err(invalid("empty field path"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(invalid("field paths cannot contain whitespace"));
        }

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let (head, first) = match parts[0] {
            REQUEST_PREFIX => {
                if parts.len() < 2 {
                    return Err(invalid("missing @request property"));
                }
                (PathHead::Request, 1)
            }
            COLLECTION_PREFIX => {
                if parts.len() < 3 {
                    return Err(invalid("expected @collection.<name>.<field>"));
                }
                let (name, alias) = match parts[1].split_once(':') {
                    Some((name, alias)) => (name, Some(alias)),
                    None => (parts[1], None),
                };
                if !is_segment(name) || alias.is_some_and(|a| !is_segment(a)) {
                    return Err(invalid("invalid @collection name or alias"));
                }
                (
                    PathHead::Collection {
                        name: name.to_string(),
                        alias: alias.map(str::to_string),
                    },
                    2,
                )
            }
            other if other.starts_with('@') => {
                return Err(ResolveError::unknown_field(
                    raw,
                    format!("unknown path prefix {other:?}"),
                ));
            }
            _ => (PathHead::Schema, 0),
        };

        let mut segments: Vec<String> = parts[first..].iter().map(|p| p.to_string()).collect();

        let mut modifier = None;
        if let Some(last) = segments.last_mut() {
            if let Some((name, suffix)) = last.split_once(':') {
                let parsed = suffix
                    .parse::<Modifier>()
                    .map_err(|_| invalid(&format!("unknown modifier {suffix:?}")))?;
                modifier = Some(parsed);
                *last = name.to_string();
            }
        }

        if let Some(bad) = segments.iter().find(|s| !is_segment(s)) {
            return Err(invalid(&format!("invalid path segment {bad:?}")));
        }

        let head = match head {
            PathHead::Schema if segments.len() == 1 && STATIC_FIELDS.contains(&segments[0].as_str()) => {
                PathHead::Static(segments[0].clone())
            }
            head => head,
        };

        Ok(Self {
            raw: raw.to_string(),
            head,
            segments,
            modifier,
        })
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
