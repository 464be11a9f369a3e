//! SQL building blocks produced by the resolver.

pub mod json;

mod expr;
mod select;

pub use expr::{columnify, placeholder, quote_column, quote_ident, Expr, Params};
pub use select::{JoinClause, SelectQuery};
