//! A minimal SELECT builder.

use super::expr::{quote_ident, Expr, Params};

/// A `LEFT JOIN` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Joined table or table-valued expression.
    pub table: Expr,
    /// Alias of the joined rows.
    pub alias: String,
    /// Join condition. Without one every row is joined.
    pub on: Option<Expr>,
}

impl JoinClause {
    /// Create a join clause.
    pub fn new(table: Expr, alias: impl Into<String>, on: Option<Expr>) -> Self {
        Self {
            table,
            alias: alias.into(),
            on,
        }
    }

    /// Render the clause.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("LEFT JOIN {} AS {}", self.table.sql, quote_ident(&self.alias));
        if let Some(on) = &self.on {
            sql.push_str(" ON ");
            sql.push_str(&on.sql);
        }
        sql
    }

    /// Parameters referenced by the table expression and the condition.
    pub fn params(&self) -> Params {
        let mut params = self.table.params.clone();
        if let Some(on) = &self.on {
            params.extend(on.params.clone());
        }
        params
    }
}

/// A SELECT statement over one aliased base table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    alias: String,
    columns: Vec<String>,
    distinct: bool,
    joins: Vec<JoinClause>,
    wheres: Vec<Expr>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// Select from a table aliased by its own name.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::with_alias(table.clone(), table)
    }

    /// Select from an aliased table.
    pub fn with_alias(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Set the selected columns. Defaults to every column of the base table.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Base table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Base table alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Toggle `SELECT DISTINCT`.
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Check if the query selects distinct rows.
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Append a LEFT JOIN.
    pub fn left_join(&mut self, join: JoinClause) -> &mut Self {
        self.joins.push(join);
        self
    }

    /// Joins in emission order.
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// AND a condition into the WHERE clause.
    pub fn and_where(&mut self, condition: Expr) -> &mut Self {
        if !condition.is_empty() {
            self.wheres.push(condition);
        }
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(&mut self, term: impl Into<String>) -> &mut Self {
        self.order_by.push(term.into());
        self
    }

    /// Set the LIMIT.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Set the OFFSET.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Render the statement and collect all parameters.
    pub fn build(&self) -> Expr {
        let mut params = Params::new();
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push_str(&format!("{}.*", quote_ident(&self.alias)));
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(&self.table));
        if self.alias != self.table {
            sql.push_str(" AS ");
            sql.push_str(&quote_ident(&self.alias));
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
            params.extend(join.params());
        }

        let filter = Expr::and(self.wheres.clone());
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            params.extend(filter.params);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Expr::new(sql, params)
    }
}
