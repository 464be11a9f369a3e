//! Correlated subqueries for "all elements must match" comparisons.
//!
//! When a path crosses a multi-valued hop, a plain comparison against the
//! joined rows only asks whether *some* element matches. To require *every*
//! element to match, the walk is replayed over aliased copies of the same
//! joins inside a subquery that yields one `multiMatchValue` per element and
//! is correlated to the outer row by id.

use std::sync::Arc;

use crate::catalog::Collection;
use crate::query::{quote_column, quote_ident, Expr, JoinClause, Params};

/// Name of the value column selected by multi-match subqueries.
pub const MULTI_MATCH_VALUE: &str = "multiMatchValue";

/// Alias of the subquery copy of a join.
pub(crate) fn clone_alias(alias: &str) -> String {
    if alias.starts_with("__") {
        format!("__mm{alias}")
    } else {
        format!("__mm_{alias}")
    }
}

/// A subquery producing every element value of a multi-valued path.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatchSubquery {
    /// Alias of the outer row the subquery is correlated with.
    base_alias: String,
    table: String,
    from_alias: String,
    pub(crate) joins: Vec<JoinClause>,
    /// Joins whose collection rule still has to be applied, by index.
    pub(crate) pending_scopes: Vec<(usize, Arc<Collection>)>,
    value: String,
}

impl MultiMatchSubquery {
    pub(crate) fn new(base_alias: &str, table: &str) -> Self {
        Self {
            base_alias: base_alias.to_string(),
            table: table.to_string(),
            from_alias: clone_alias(base_alias),
            joins: Vec::new(),
            pending_scopes: Vec::new(),
            value: String::new(),
        }
    }

    /// Alias of the base table inside the subquery.
    pub fn from_alias(&self) -> &str {
        &self.from_alias
    }

    /// Joins replayed inside the subquery.
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Expression selected as the element value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn push_join(&mut self, join: JoinClause, scope: Option<Arc<Collection>>) {
        if let Some(collection) = scope {
            self.pending_scopes.push((self.joins.len(), collection));
        }
        self.joins.push(join);
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.value = value;
    }

    /// Render the subquery.
    pub fn build(&self) -> Expr {
        let mut params = Params::new();
        let mut sql = format!(
            "SELECT {} AS {} FROM {} AS {}",
            self.value,
            quote_ident(MULTI_MATCH_VALUE),
            quote_ident(&self.table),
            quote_ident(&self.from_alias),
        );
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
            params.extend(join.params());
        }
        sql.push_str(&format!(
            " WHERE {} = {}",
            quote_column(&self.from_alias, "id"),
            quote_column(&self.base_alias, "id")
        ));
        Expr::new(sql, params)
    }
}
