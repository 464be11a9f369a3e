//! basekit Core - collection catalog and filter-to-SQL field resolution.
//!
//! This crate turns the filter and sort expressions of collection rules and
//! record searches into parameterized SQL for a SQLite-backed record store.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod request;
pub mod resolver;
pub mod search;

pub use catalog::{
    Catalog, Collection, CollectionKind, Field, FieldKind, RelationOptions, Rule, RuleKind,
    SchemaBundle,
};
pub use config::{ResolverConfig, DEFAULT_MAX_RELATION_DEPTH};
pub use error::Error;
pub use query::{Expr, JoinClause, Params, SelectQuery};
pub use record::{ExportView, Record};
pub use request::RequestInfo;
pub use resolver::{
    FieldPath, Modifier, RecordFieldResolver, ResolveError, ResolveResult, ResolvedField,
    ResolverContext,
};
pub use search::{build_expr, FieldResolver, SearchQuery, SortField};

/// Re-export the filter language.
pub use basekit_lang as lang;
