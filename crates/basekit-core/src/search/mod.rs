//! Record search: filters and sort compiled through a field resolver.

mod filter;
mod sort;

use serde_json::Value;

pub use filter::build_expr;
pub use sort::{SortDirection, SortField, RANDOM_SORT_KEY, ROWID_SORT_KEY};

use crate::query::{Expr, SelectQuery};
use crate::resolver::{ResolveResult, ResolvedField};

/// Maximum number of rows a search may request.
pub const MAX_LIMIT: u64 = 1000;

/// Resolves identifiers of a filter or sort expression.
pub trait FieldResolver {
    /// Resolve a field path to an SQL operand.
    fn resolve(&mut self, path: &str) -> ResolveResult<ResolvedField>;

    /// Bind a literal as a new named parameter.
    fn bind(&mut self, value: Value) -> ResolvedField;

    /// A fresh alias with the given prefix.
    fn next_alias(&mut self, prefix: &str) -> String;

    /// Add the joins needed by everything resolved so far to a query.
    fn update_query(&self, query: &mut SelectQuery) -> ResolveResult<()>;

    /// Marker for the resolver state, to undo a failed compilation.
    fn checkpoint(&self) -> usize;

    /// Drop everything registered after `checkpoint`.
    fn rollback(&mut self, checkpoint: usize);
}

/// A search over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Filter expressions, ANDed together.
    pub filters: Vec<String>,
    /// Sort terms in priority order.
    pub sort: Vec<SortField>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SearchQuery {
    /// Create an empty search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter expression. Blank filters are ignored.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if !filter.trim().is_empty() {
            self.filters.push(filter);
        }
        self
    }

    /// Add sort terms from a `-created,title` style string.
    pub fn with_sort(mut self, sort: &str) -> Self {
        self.sort.extend(SortField::parse_list(sort));
        self
    }

    /// Set the limit, capped at [`MAX_LIMIT`].
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit.min(MAX_LIMIT));
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compile into `query`, which must select from the resolver's base
    /// collection.
    ///
    /// On error neither `query` nor the resolver's joins are changed.
    pub fn apply(&self, resolver: &mut dyn FieldResolver, query: &mut SelectQuery) -> ResolveResult<()> {
        let checkpoint = resolver.checkpoint();
        let compiled = self
            .compile(&mut *resolver)
            .and_then(|compiled| resolver.update_query(query).map(|_| compiled));
        let (wheres, orders) = match compiled {
            Ok(compiled) => compiled,
            Err(err) => {
                resolver.rollback(checkpoint);
                return Err(err);
            }
        };

        for expr in wheres {
            query.and_where(expr);
        }
        for expr in orders {
            query.order_by(expr);
        }
        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query.offset(offset);
        }
        Ok(())
    }

    fn compile(&self, resolver: &mut dyn FieldResolver) -> ResolveResult<(Vec<Expr>, Vec<String>)> {
        let mut wheres = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let ast = basekit_lang::parse_filter(filter)?;
            wheres.push(build_expr(&ast, &mut *resolver)?);
        }
        let orders = self
            .sort
            .iter()
            .map(|term| term.build_expr(&mut *resolver))
            .collect::<ResolveResult<Vec<_>>>()?;
        Ok((wheres, orders))
    }
}
