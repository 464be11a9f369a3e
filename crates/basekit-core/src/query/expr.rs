//! SQL fragments with named parameters.

use std::collections::BTreeMap;

use serde_json::Value;

/// Named parameters of a SQL fragment, referenced as `{:name}`.
pub type Params = BTreeMap<String, Value>;

/// A SQL fragment together with the parameters it references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    pub sql: String,
    pub params: Params,
}

impl Expr {
    /// Create an expression.
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Create an expression without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Params::new())
    }

    /// Check if the fragment is blank.
    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Wrap the fragment in parentheses.
    pub fn enclose(self) -> Self {
        Self {
            sql: format!("({})", self.sql),
            params: self.params,
        }
    }

    /// Join fragments with AND.
    pub fn and(parts: Vec<Expr>) -> Self {
        Self::join(parts, "AND")
    }

    /// Join fragments with OR.
    pub fn or(parts: Vec<Expr>) -> Self {
        Self::join(parts, "OR")
    }

    /// Join non-blank fragments with a logical operator. Each part is
    /// parenthesized when there is more than one.
    fn join(parts: Vec<Expr>, op: &str) -> Self {
        let mut parts: Vec<Expr> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        match parts.len() {
            0 => Self::default(),
            1 => parts.remove(0),
            _ => {
                let mut params = Params::new();
                let mut sql = Vec::with_capacity(parts.len());
                for part in parts {
                    sql.push(format!("({})", part.sql));
                    params.extend(part.params);
                }
                Self::new(sql.join(&format!(" {op} ")), params)
            }
        }
    }
}

/// Quote an identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a qualified column reference.
pub fn quote_column(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}

/// Placeholder for a named parameter.
pub fn placeholder(name: &str) -> String {
    format!("{{:{name}}}")
}

/// Strip everything but ASCII letters, digits and `_`.
pub fn columnify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
