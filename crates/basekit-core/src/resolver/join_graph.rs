//! Deduplicated LEFT JOINs accumulated while resolving paths.
//!
//! Joins are keyed by the node they hang off and the edge they follow, so two
//! paths walking the same relation from the same place share one join while
//! the same relation reached from different places gets separate aliases.

use std::collections::HashMap;

use crate::query::{quote_ident, Expr, JoinClause, SelectQuery};

/// The node a join is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinOrigin {
    /// The base table of the query.
    Root,
    /// A previously registered join, by index.
    Node(usize),
}

/// The edge a join follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinEdge {
    /// Forward relation field.
    Relation(String),
    /// Back-relation `<collection>_via_<field>`, keyed by collection id.
    BackRelation { collection: String, field: String },
    /// `json_each` over a multi-valued field.
    JsonEach(String),
    /// `@collection.<name>[:<alias>]`, keyed by collection id.
    Collection {
        collection: String,
        alias: Option<String>,
    },
    /// The authenticated record.
    Auth,
    /// Records referenced by a submitted relation value.
    BodyRelation(String),
    /// `json_each` over a submitted multi-valued value.
    BodyEach(String),
}

/// Join identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub parent: JoinOrigin,
    pub edge: JoinEdge,
}

impl JoinKey {
    /// Create a join key.
    pub fn new(parent: JoinOrigin, edge: JoinEdge) -> Self {
        Self { parent, edge }
    }

    /// A join attached to the base table.
    pub fn root(edge: JoinEdge) -> Self {
        Self::new(JoinOrigin::Root, edge)
    }
}

/// What to join, produced by a join builder once the alias is known.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub table: Expr,
    pub on: Option<Expr>,
    /// The join can produce more than one row per base row.
    pub multi_valued: bool,
}

impl JoinSpec {
    /// Join a table-valued expression.
    pub fn new(table: Expr) -> Self {
        Self {
            table,
            on: None,
            multi_valued: false,
        }
    }

    /// Join a collection table by name.
    pub fn table(name: &str) -> Self {
        Self::new(Expr::raw(quote_ident(name)))
    }

    /// Set the join condition.
    pub fn on(mut self, on: impl Into<Option<Expr>>) -> Self {
        self.on = on.into();
        self
    }

    /// Mark the join as producing multiple rows.
    pub fn multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = multi_valued;
        self
    }
}

/// A registered join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub key: JoinKey,
    pub alias: String,
    pub table: Expr,
    pub on: Option<Expr>,
    pub multi_valued: bool,
}

impl JoinNode {
    /// Convert to a query join clause.
    pub fn to_clause(&self) -> JoinClause {
        JoinClause::new(self.table.clone(), self.alias.clone(), self.on.clone())
    }
}

/// Registration-ordered set of joins with unique aliases.
#[derive(Debug, Clone)]
pub struct JoinGraph {
    root_alias: String,
    nodes: Vec<JoinNode>,
    index: HashMap<JoinKey, usize>,
}

impl JoinGraph {
    /// Create an empty graph for a base table alias.
    pub fn new(root_alias: impl Into<String>) -> Self {
        Self {
            root_alias: root_alias.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Find an existing join.
    pub fn lookup(&self, key: &JoinKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// An alias derived from `hint` that is not in use yet.
    pub fn unique_alias(&self, hint: &str) -> String {
        let taken = |alias: &str| alias == self.root_alias || self.nodes.iter().any(|n| n.alias == alias);
        if !taken(hint) {
            return hint.to_string();
        }
        (2..)
            .map(|n| format!("{hint}{n}"))
            .find(|alias| !taken(alias))
            .unwrap_or_else(|| hint.to_string())
    }

    /// Register a join under an alias obtained from [`unique_alias`](Self::unique_alias).
    pub fn insert(&mut self, key: JoinKey, alias: String, spec: JoinSpec) -> usize {
        let idx = self.nodes.len();
        self.index.insert(key.clone(), idx);
        self.nodes.push(JoinNode {
            key,
            alias,
            table: spec.table,
            on: spec.on,
            multi_valued: spec.multi_valued,
        });
        idx
    }

    /// Get a join by index.
    pub fn node(&self, idx: usize) -> &JoinNode {
        &self.nodes[idx]
    }

    /// Joins in registration order.
    pub fn nodes(&self) -> &[JoinNode] {
        &self.nodes
    }

    /// Number of joins.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no joins were registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if any join can multiply base rows.
    pub fn has_multi_valued(&self) -> bool {
        self.nodes.iter().any(|n| n.multi_valued)
    }

    /// Mark the current state so a failed resolution can be undone.
    pub fn checkpoint(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every join registered after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: usize) {
        if checkpoint >= self.nodes.len() {
            return;
        }
        self.nodes.truncate(checkpoint);
        self.index.retain(|_, idx| *idx < checkpoint);
    }

    /// Append all joins to a query, in registration order, and make the query
    /// DISTINCT if any join is multi-valued.
    pub fn apply(&self, query: &mut SelectQuery) {
        for node in &self.nodes {
            query.left_join(node.to_clause());
        }
        if self.has_multi_valued() {
            query.distinct(true);
        }
    }
}
