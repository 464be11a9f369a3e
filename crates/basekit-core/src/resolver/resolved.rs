//! The result of resolving a single field path.

use serde_json::Value;

use super::multi_match::MultiMatchSubquery;
use crate::query::{placeholder, Params};

/// A resolved operand: a SQL expression plus what the comparison builder
/// needs to know about it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedField {
    /// SQL expression, e.g. a quoted column, a placeholder or a literal.
    pub identifier: String,
    /// Parameters referenced by the expression.
    pub params: Params,
    /// Compare with `IS`/`IS NOT` instead of coalescing NULL to `''`.
    pub no_coalesce: bool,
    /// Set when the path crosses a multi-valued hop.
    pub multi_match: Option<MultiMatchSubquery>,
    /// Column that must be TRUE for the comparison to hold.
    pub visibility_guard: Option<String>,
}

impl ResolvedField {
    /// A column or SQL expression.
    pub fn column(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// A literal SQL token such as `NULL` or `TRUE`.
    pub fn literal(sql: &str) -> Self {
        Self::column(sql)
    }

    /// A bound parameter.
    pub fn param(name: &str, value: Value) -> Self {
        Self {
            identifier: placeholder(name),
            params: Params::from([(name.to_string(), value)]),
            ..Self::default()
        }
    }

    /// Whether comparisons must consider every element.
    pub fn is_multi_valued(&self) -> bool {
        self.multi_match.is_some()
    }
}
