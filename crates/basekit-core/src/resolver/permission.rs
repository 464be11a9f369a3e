//! Collection rule injection for joined collections.
//!
//! Rows of a joined collection are only visible to a filter when the caller
//! could also read them directly, so the collection's rule is compiled against
//! the join alias and ANDed into the join condition.

use std::sync::Arc;

use tracing::trace;

use super::error::{ResolveError, ResolveResult};
use super::join_graph::JoinGraph;
use super::multi_match::MultiMatchSubquery;
use super::walk::and_scope;
use super::{RecordFieldResolver, ResolverContext};
use crate::catalog::{Collection, Rule};
use crate::query::{quote_column, Expr, SelectQuery};
use crate::search;

/// Prefix of the alias used when a rule needs joins of its own.
const RULE_ALIAS_PREFIX: &str = "__rule_";

impl RecordFieldResolver {
    /// The condition restricting `alias` rows of `target` to what the caller
    /// may read. `None` means unrestricted.
    pub(crate) fn scope_join(
        &mut self,
        target: &Arc<Collection>,
        alias: &str,
    ) -> ResolveResult<Option<Expr>> {
        if self.context.allow_hidden_fields {
            return Ok(None);
        }
        if self.rule_stack.iter().any(|id| id == &target.id) {
            trace!(collection = %target.name, "rule already being applied");
            return Ok(None);
        }

        match target.rule(self.config.rule) {
            Rule::Public => Ok(None),
            Rule::SuperuserOnly => Err(ResolveError::PermissionDenied(format!(
                "collection {:?} is only accessible to superusers",
                target.name
            ))),
            Rule::Filter(filter) => {
                let filter = filter.clone();
                self.compile_rule(target, alias, &filter).map(Some)
            }
        }
    }

    /// Apply collection rules to the joins of a multi-match subquery.
    pub(crate) fn finalize_multi_match(&mut self, mm: &mut MultiMatchSubquery) -> ResolveResult<()> {
        for (idx, target) in std::mem::take(&mut mm.pending_scopes) {
            let alias = mm.joins[idx].alias.clone();
            if let Some(scope) = self.scope_join(&target, &alias)? {
                let join = &mut mm.joins[idx];
                join.on = Some(match join.on.take() {
                    Some(on) => and_scope(on, Some(scope)),
                    None => scope,
                });
            }
        }
        Ok(())
    }

    /// Compile a rule against an alias of its collection.
    ///
    /// A rule that only touches the row itself is inlined. A rule that needs
    /// joins cannot live in a join condition, so it is compiled over its own
    /// alias inside a correlated `EXISTS`.
    fn compile_rule(&mut self, target: &Arc<Collection>, alias: &str, filter: &str) -> ResolveResult<Expr> {
        let ast = basekit_lang::parse_filter(filter)?;

        let mut nested = self.nested(target.clone(), alias.to_string());
        let expr = search::build_expr(&ast, &mut nested)?;
        self.seq = nested.seq;
        if nested.joins.is_empty() {
            return Ok(expr);
        }

        let rule_alias = format!("{RULE_ALIAS_PREFIX}{alias}");
        let mut nested = self.nested(target.clone(), rule_alias.clone());
        let expr = search::build_expr(&ast, &mut nested)?;
        self.seq = nested.seq;

        let mut query = nested.base_query().select(["1"]);
        nested.update_query(&mut query)?;
        query.and_where(Expr::raw(format!(
            "{} = {}",
            quote_column(&rule_alias, "id"),
            quote_column(alias, "id")
        )));
        query.and_where(expr);
        let built = query.build();
        trace!(collection = %target.name, alias, "rule compiled as EXISTS subquery");
        Ok(Expr::new(format!("EXISTS ({})", built.sql), built.params))
    }

    /// A resolver for compiling `target`'s rule with `alias` as its base.
    fn nested(&self, target: Arc<Collection>, alias: String) -> RecordFieldResolver {
        let mut rule_stack = self.rule_stack.clone();
        rule_stack.push(target.id.clone());
        RecordFieldResolver {
            schema: self.schema.clone(),
            context: ResolverContext {
                base_collection: target,
                request_info: self.context.request_info.clone(),
                allow_hidden_fields: false,
                original: None,
            },
            config: self.config.clone(),
            joins: JoinGraph::new(alias.clone()),
            base_alias: alias,
            seq: self.seq,
            static_request: self.static_request.clone(),
            rule_stack,
        }
    }
}
