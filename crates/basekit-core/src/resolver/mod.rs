//! Record field resolver.
//!
//! Turns field paths used in filters and sort expressions into SQL operands,
//! accumulating the LEFT JOINs they need, and enforcing the access rules of
//! every collection a path reaches.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use basekit_core::catalog::{Collection, Field, RelationOptions, Rule, SchemaBundle};
//! use basekit_core::resolver::{RecordFieldResolver, ResolverContext};
//!
//! let schema = Arc::new(
//!     SchemaBundle::new(1).with_collection(
//!         Collection::new("demo4")
//!             .with_read_rule(Rule::Public)
//!             .with_field(Field::text("title"))
//!             .with_field(Field::relation("self_rel_one", RelationOptions::new("demo4"))),
//!     ),
//! );
//! let base = schema.collection("demo4").unwrap();
//! let mut resolver = RecordFieldResolver::new(schema, ResolverContext::new(base));
//!
//! let field = resolver.resolve("self_rel_one.title").unwrap();
//! assert_eq!(field.identifier, "`demo4_self_rel_one`.`title`");
//! assert_eq!(resolver.joins().len(), 1);
//! ```

mod error;
mod join_graph;
mod multi_match;
mod path;
mod permission;
mod request;
mod resolved;
mod walk;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

pub use error::{ResolveError, ResolveResult};
pub use join_graph::{JoinEdge, JoinGraph, JoinKey, JoinNode, JoinOrigin, JoinSpec};
pub use multi_match::{MultiMatchSubquery, MULTI_MATCH_VALUE};
pub use path::{FieldPath, Modifier, PathHead};
pub use resolved::ResolvedField;

use crate::catalog::{Collection, SchemaBundle};
use crate::config::ResolverConfig;
use crate::query::{columnify, quote_column, Expr, SelectQuery};
use crate::record::Record;
use crate::request::RequestInfo;
use crate::search::{self, FieldResolver};
use walk::Walker;

/// Who is asking and about what.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    base_collection: Arc<Collection>,
    request_info: Option<Arc<RequestInfo>>,
    allow_hidden_fields: bool,
    original: Option<Arc<Record>>,
}

impl ResolverContext {
    /// Resolve paths against a base collection, without request data.
    pub fn new(base_collection: Arc<Collection>) -> Self {
        Self {
            base_collection,
            request_info: None,
            allow_hidden_fields: false,
            original: None,
        }
    }

    /// Attach request data for `@request.*` paths.
    pub fn with_request_info(mut self, info: RequestInfo) -> Self {
        self.request_info = Some(Arc::new(info));
        self
    }

    /// Privileged mode: hidden fields are resolvable and no collection rule
    /// is applied.
    pub fn with_allow_hidden_fields(mut self, allow: bool) -> Self {
        self.allow_hidden_fields = allow;
        self
    }

    /// The stored record a request modifies, for `:changed`.
    pub fn with_original(mut self, record: Record) -> Self {
        self.original = Some(Arc::new(record));
        self
    }

    /// The base collection.
    pub fn base_collection(&self) -> &Arc<Collection> {
        &self.base_collection
    }

    /// Request data, if any.
    pub fn request_info(&self) -> Option<&RequestInfo> {
        self.request_info.as_deref()
    }

    /// Whether the caller is privileged.
    pub fn allow_hidden_fields(&self) -> bool {
        self.allow_hidden_fields
    }
}

/// Counters for parameter names and generated aliases. Nested rule resolvers
/// continue from their parent's counters so names never collide.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Sequence {
    params: usize,
    aliases: usize,
}

/// Resolves field paths of one base collection for one query.
#[derive(Debug)]
pub struct RecordFieldResolver {
    schema: Arc<SchemaBundle>,
    context: ResolverContext,
    config: ResolverConfig,
    base_alias: String,
    joins: JoinGraph,
    seq: Sequence,
    static_request: Arc<Value>,
    /// Collections whose rule is being compiled, outermost first.
    rule_stack: Vec<String>,
}

impl RecordFieldResolver {
    /// Create a resolver. The base collection is aliased by its own name.
    pub fn new(schema: Arc<SchemaBundle>, context: ResolverContext) -> Self {
        let base_alias = columnify(&context.base_collection.name);
        let static_request = Arc::new(request::static_request_info(context.request_info()));
        Self {
            schema,
            joins: JoinGraph::new(base_alias.clone()),
            base_alias,
            context,
            config: ResolverConfig::default(),
            seq: Sequence::default(),
            static_request,
            rule_stack: Vec::new(),
        }
    }

    /// Set the resolver configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Alias of the base table.
    pub fn base_alias(&self) -> &str {
        &self.base_alias
    }

    /// The resolver context.
    pub fn context(&self) -> &ResolverContext {
        &self.context
    }

    /// The resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Joins registered so far.
    pub fn joins(&self) -> &JoinGraph {
        &self.joins
    }

    /// An empty SELECT over the base table with the right alias.
    pub fn base_query(&self) -> SelectQuery {
        SelectQuery::with_alias(self.context.base_collection.name.clone(), self.base_alias.clone())
    }

    /// Resolve a field path.
    ///
    /// On error every join registered while resolving this path is dropped.
    #[instrument(level = "trace", skip(self), fields(collection = %self.context.base_collection.name))]
    pub fn resolve(&mut self, path: &str) -> ResolveResult<ResolvedField> {
        let checkpoint = self.joins.checkpoint();
        let result = FieldPath::parse(path).and_then(|parsed| self.resolve_path(&parsed));
        if let Err(err) = &result {
            self.joins.rollback(checkpoint);
            debug!(path, error = %err, "field resolution failed");
        }
        result
    }

    /// Add the registered joins to a query over the base table.
    pub fn update_query(&self, query: &mut SelectQuery) -> ResolveResult<()> {
        if query.alias() != self.base_alias {
            return Err(ResolveError::InvalidQuery(format!(
                "query alias {:?} does not match resolver base alias {:?}",
                query.alias(),
                self.base_alias
            )));
        }
        self.joins.apply(query);
        Ok(())
    }

    /// Parse and compile a filter expression into a WHERE condition.
    ///
    /// On error every join registered while compiling is dropped.
    pub fn compile_filter(&mut self, filter: &str) -> ResolveResult<Expr> {
        let ast = basekit_lang::parse_filter(filter)?;
        search::build_expr(&ast, self)
    }

    /// Bind a value as a new named parameter.
    pub fn bind(&mut self, value: Value) -> ResolvedField {
        let name = format!("p{}", self.seq.params);
        self.seq.params += 1;
        ResolvedField::param(&name, value)
    }

    /// A fresh alias with the given prefix.
    pub fn next_alias(&mut self, prefix: &str) -> String {
        self.seq.aliases += 1;
        format!("{prefix}{}", self.seq.aliases)
    }

    fn resolve_path(&mut self, path: &FieldPath) -> ResolveResult<ResolvedField> {
        match &path.head {
            PathHead::Static(column) if path.modifier.is_none() => {
                Ok(ResolvedField::column(quote_column(&self.base_alias, column)))
            }
            PathHead::Static(_) | PathHead::Schema => {
                Walker::new(self, &path.raw).process(&path.segments, path.modifier)
            }
            PathHead::Collection { name, alias } => {
                let target = self.lookup_collection(name).ok_or_else(|| {
                    ResolveError::unknown_field(&path.raw, format!("unknown collection {name:?}"))
                })?;
                let mut walker = Walker::new(self, &path.raw);
                walker.enter_collection(target, alias.as_deref())?;
                walker.process(&path.segments, path.modifier)
            }
            PathHead::Request => self.resolve_request(path),
        }
    }

    pub(crate) fn lookup_collection(&self, name_or_id: &str) -> Option<Arc<Collection>> {
        self.schema.collection(name_or_id)
    }

    /// Register a join, building it only if `key` is new. The builder gets
    /// mutable access to the resolver to compile collection rules.
    pub(crate) fn join<F>(&mut self, key: JoinKey, hint: &str, build: F) -> ResolveResult<(usize, String)>
    where
        F: FnOnce(&mut Self, &str) -> ResolveResult<JoinSpec>,
    {
        if let Some(idx) = self.joins.lookup(&key) {
            return Ok((idx, self.joins.node(idx).alias.clone()));
        }
        let alias = self.joins.unique_alias(hint);
        let spec = build(self, &alias)?;
        debug!(alias = %alias, multi_valued = spec.multi_valued, "registered join");
        let idx = self.joins.insert(key, alias.clone(), spec);
        Ok((idx, alias))
    }
}

impl FieldResolver for RecordFieldResolver {
    fn resolve(&mut self, path: &str) -> ResolveResult<ResolvedField> {
        RecordFieldResolver::resolve(self, path)
    }

    fn bind(&mut self, value: Value) -> ResolvedField {
        RecordFieldResolver::bind(self, value)
    }

    fn next_alias(&mut self, prefix: &str) -> String {
        RecordFieldResolver::next_alias(self, prefix)
    }

    fn update_query(&self, query: &mut SelectQuery) -> ResolveResult<()> {
        RecordFieldResolver::update_query(self, query)
    }

    fn checkpoint(&self) -> usize {
        self.joins.checkpoint()
    }

    fn rollback(&mut self, checkpoint: usize) {
        self.joins.rollback(checkpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Field, RelationOptions, Rule};
    use pretty_assertions::assert_eq;

    fn resolver() -> RecordFieldResolver {
        let schema = Arc::new(
            SchemaBundle::new(1).with_collection(
                Collection::new("posts")
                    .with_read_rule(Rule::Public)
                    .with_field(Field::text("title"))
                    .with_field(Field::relation("parent", RelationOptions::new("posts"))),
            ),
        );
        let base = schema.collection("posts").unwrap();
        RecordFieldResolver::new(schema, ResolverContext::new(base))
    }

    #[test]
    fn test_static_field() {
        let mut r = resolver();
        assert_eq!(r.resolve("id").unwrap().identifier, "`posts`.`id`");
        assert_eq!(r.resolve("created").unwrap().identifier, "`posts`.`created`");
        assert!(r.joins().is_empty());
    }

    #[test]
    fn test_bind_and_aliases_are_sequential() {
        let mut r = resolver();
        assert_eq!(r.bind(Value::from(1)).identifier, "{:p0}");
        assert_eq!(r.bind(Value::from(2)).identifier, "{:p1}");
        assert_eq!(r.next_alias("__sm"), "__sm1");
        assert_eq!(r.next_alias("__ml"), "__ml2");
    }

    #[test]
    fn test_failed_resolve_rolls_back() {
        let mut r = resolver();
        assert!(r.resolve("parent.missing").is_err());
        assert!(r.joins().is_empty());
        r.resolve("parent.title").unwrap();
        assert_eq!(r.joins().len(), 1);
    }

    #[test]
    fn test_update_query_checks_alias() {
        let mut r = resolver();
        r.resolve("parent.title").unwrap();
        let mut query = SelectQuery::with_alias("posts", "p");
        assert!(matches!(
            r.update_query(&mut query),
            Err(ResolveError::InvalidQuery(_))
        ));

        let mut query = r.base_query();
        r.update_query(&mut query).unwrap();
        assert_eq!(query.joins().len(), 1);
    }

    #[test]
    fn test_compile_filter() {
        let mut r = resolver();
        let expr = r.compile_filter("title = 'x'").unwrap();
        assert_eq!(expr.sql, "`posts`.`title` = {:p0}");

        assert!(matches!(
            r.compile_filter("parent.title = 'x' && nope = 1"),
            Err(ResolveError::UnknownField { .. })
        ));
        assert!(r.joins().is_empty());
        assert!(matches!(r.compile_filter("title ="), Err(ResolveError::Parse(_))));
    }

    #[test]
    fn test_search_failure_keeps_query_and_joins() {
        let mut r = resolver();
        r.resolve("parent.title").unwrap();

        let mut query = r.base_query();
        let search = search::SearchQuery::new()
            .with_filter("parent.parent.title = 'x'")
            .with_filter("nope = 1");
        assert!(search.apply(&mut r, &mut query).is_err());
        assert_eq!(r.joins().len(), 1);
        assert!(query.joins().is_empty());

        let search = search::SearchQuery::new().with_sort("-parent.parent.title,nope");
        assert!(search.apply(&mut r, &mut query).is_err());
        assert_eq!(r.joins().len(), 1);
        assert_eq!(query.build().sql, "SELECT `posts`.* FROM `posts`");
    }
}
