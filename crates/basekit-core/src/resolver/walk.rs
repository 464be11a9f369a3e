//! Schema walk: relation hops, back-relations and the final property.

use std::sync::Arc;

use serde_json::Value;

use super::error::{ResolveError, ResolveResult};
use super::join_graph::{JoinEdge, JoinKey, JoinOrigin, JoinSpec};
use super::multi_match::{clone_alias, MultiMatchSubquery};
use super::path::Modifier;
use super::resolved::ResolvedField;
use super::RecordFieldResolver;
use crate::catalog::{Collection, Field, RelationOptions, FIELD_EMAIL, FIELD_EMAIL_VISIBILITY};
use crate::query::{columnify, json, quote_column, quote_ident, Expr, JoinClause};

/// Separator of back-relation segments: `<collection>_via_<field>`.
const VIA: &str = "_via_";

/// Walks one field path segment by segment.
///
/// Every hop is registered twice: once in the resolver's join graph and once,
/// under a `__mm` alias, in the multi-match subquery that is attached to the
/// result if the path turned out to be multi-valued.
pub(crate) struct Walker<'r> {
    resolver: &'r mut RecordFieldResolver,
    path: &'r str,
    collection: Arc<Collection>,
    alias: String,
    origin: JoinOrigin,
    hops: usize,
    mm: MultiMatchSubquery,
    mm_alias: String,
    multi: bool,
}

impl<'r> Walker<'r> {
    /// Start at the resolver's base collection.
    pub(crate) fn new(resolver: &'r mut RecordFieldResolver, path: &'r str) -> Self {
        let collection = resolver.context.base_collection.clone();
        let alias = resolver.base_alias.clone();
        let mm = MultiMatchSubquery::new(&alias, &collection.name);
        let mm_alias = mm.from_alias().to_string();
        Self {
            resolver,
            path,
            collection,
            alias,
            origin: JoinOrigin::Root,
            hops: 0,
            mm,
            mm_alias,
            multi: false,
        }
    }

    /// Resolve the remaining segments from the current position.
    pub(crate) fn process(
        mut self,
        segments: &[String],
        modifier: Option<Modifier>,
    ) -> ResolveResult<ResolvedField> {
        let Some((last, hops)) = segments.split_last() else {
            return Err(ResolveError::invalid_format(self.path, "missing field name"));
        };

        for (i, segment) in hops.iter().enumerate() {
            let collection = self.collection.clone();
            let Some(field) = collection.field(segment) else {
                match segment.split_once(VIA) {
                    Some((name, field)) => self.back_relation_hop(segment, name, field)?,
                    None => {
                        return Err(self.unknown(format!(
                            "{:?} has no field {segment:?}",
                            collection.name
                        )))
                    }
                }
                continue;
            };

            self.check_hidden(&collection, field)?;
            if field.is_json() {
                return self.json_path(field, &segments[i + 1..], modifier);
            }
            let Some(options) = field.relation_options() else {
                return Err(self.unknown(format!("{segment:?} is not a relation field")));
            };

            // `rel.id` of a single relation is the local column.
            if !field.is_multiple() && i + 1 == hops.len() && last == "id" {
                return self.last_prop(segment, modifier);
            }

            self.relation_hop(field, options)?;
        }

        self.last_prop(last, modifier)
    }

    /// Continue from an `@collection` join.
    pub(crate) fn enter_collection(
        &mut self,
        target: Arc<Collection>,
        alias: Option<&str>,
    ) -> ResolveResult<()> {
        let hint = match alias {
            Some(alias) => format!("__collection_alias_{}", columnify(alias)),
            None => format!("__collection_{}", columnify(&target.name)),
        };
        let key = JoinKey::root(JoinEdge::Collection {
            collection: target.id.clone(),
            alias: alias.map(str::to_string),
        });
        let scope_target = target.clone();
        let (idx, join_alias) = self.resolver.join(key, &hint, move |r, alias| {
            let scope = r.scope_join(&scope_target, alias)?;
            Ok(JoinSpec::table(&scope_target.name).on(scope).multi_valued(true))
        })?;

        let mm_alias = clone_alias(&join_alias);
        self.mm.push_join(
            JoinClause::new(Expr::raw(quote_ident(&target.name)), mm_alias.clone(), None),
            Some(target.clone()),
        );
        self.multi = true;
        self.advance(target, join_alias, idx, mm_alias);
        Ok(())
    }

    /// Continue from the authenticated record.
    pub(crate) fn enter_auth(&mut self, collection: Arc<Collection>, id: &str) -> ResolveResult<()> {
        let id_param = self.resolver.bind(Value::String(id.to_string()));
        let hint = format!("__auth_{}", columnify(&collection.name));
        let table = collection.name.clone();
        let param = id_param.clone();
        let (idx, alias) = self.resolver.join(JoinKey::root(JoinEdge::Auth), &hint, move |_, alias| {
            Ok(JoinSpec::table(&table).on(Expr::new(
                format!("{} = {}", quote_column(alias, "id"), param.identifier),
                param.params,
            )))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(
            JoinClause::new(
                Expr::raw(quote_ident(&collection.name)),
                mm_alias.clone(),
                Some(Expr::new(
                    format!("{} = {}", quote_column(&mm_alias, "id"), id_param.identifier),
                    id_param.params,
                )),
            ),
            None,
        );
        self.advance(collection, alias, idx, mm_alias);
        Ok(())
    }

    /// Continue from the records referenced by a submitted relation value.
    pub(crate) fn enter_body_relation(&mut self, field: &Field, ids: &[String]) -> ResolveResult<()> {
        let Some(options) = field.relation_options() else {
            return Err(self.unknown(format!("{:?} is not a relation field", field.name)));
        };
        let target = self.target_collection(field, options)?;

        let placeholders: Vec<ResolvedField> = ids
            .iter()
            .map(|id| self.resolver.bind(Value::String(id.clone())))
            .collect();
        let list = placeholders
            .iter()
            .map(|p| p.identifier.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let params: crate::query::Params = placeholders.into_iter().flat_map(|p| p.params).collect();

        let multiple = field.is_multiple();
        let hint = format!("__data_{}_{}", columnify(&target.name), columnify(&field.name));
        let key = JoinKey::root(JoinEdge::BodyRelation(field.name.clone()));
        let scope_target = target.clone();
        let (on_list, on_params) = (list.clone(), params.clone());
        let (idx, alias) = self.resolver.join(key, &hint, move |r, alias| {
            let on = Expr::new(format!("{} IN ({on_list})", quote_column(alias, "id")), on_params);
            let scope = r.scope_join(&scope_target, alias)?;
            Ok(JoinSpec::table(&scope_target.name)
                .on(and_scope(on, scope))
                .multi_valued(multiple))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(
            JoinClause::new(
                Expr::raw(quote_ident(&target.name)),
                mm_alias.clone(),
                Some(Expr::new(format!("{} IN ({list})", quote_column(&mm_alias, "id")), params)),
            ),
            Some(target.clone()),
        );
        if multiple {
            self.multi = true;
        }
        self.advance(target, alias, idx, mm_alias);
        Ok(())
    }

    /// Resolve `@request.body.<field>:each` over the submitted values.
    pub(crate) fn body_each(mut self, field: &Field, items: &[String]) -> ResolveResult<ResolvedField> {
        let encoded = Value::Array(items.iter().cloned().map(Value::String).collect()).to_string();
        let source = self.resolver.bind(Value::String(encoded));
        let table = Expr::new(format!("json_each({})", source.identifier), source.params);

        let hint = format!("__je_data_{}", columnify(&field.name));
        let key = JoinKey::root(JoinEdge::BodyEach(field.name.clone()));
        let join_table = table.clone();
        let (_, alias) = self.resolver.join(key, &hint, move |_, _| {
            Ok(JoinSpec::new(join_table).multi_valued(true))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(JoinClause::new(table, mm_alias.clone(), None), None);
        self.mm.set_value(quote_column(&mm_alias, "value"));
        self.multi = true;
        self.finish(ResolvedField::column(quote_column(&alias, "value")))
    }

    fn relation_hop(&mut self, field: &Field, options: &RelationOptions) -> ResolveResult<()> {
        self.count_hop()?;
        let target = self.target_collection(field, options)?;
        let column = columnify(&field.name);
        let multiple = field.is_multiple();

        let (value, mm_value) = if multiple {
            let (je, mm_je) = self.json_each(&field.name)?;
            (quote_column(&je, "value"), quote_column(&mm_je, "value"))
        } else {
            (
                quote_column(&self.alias, &column),
                quote_column(&self.mm_alias, &column),
            )
        };

        let hint = format!("{}_{}", self.alias, column);
        let key = JoinKey::new(self.origin.clone(), JoinEdge::Relation(field.name.clone()));
        let scope_target = target.clone();
        let (idx, alias) = self.resolver.join(key, &hint, move |r, alias| {
            let on = Expr::raw(format!("{} = {value}", quote_column(alias, "id")));
            let scope = r.scope_join(&scope_target, alias)?;
            Ok(JoinSpec::table(&scope_target.name)
                .on(and_scope(on, scope))
                .multi_valued(multiple))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(
            JoinClause::new(
                Expr::raw(quote_ident(&target.name)),
                mm_alias.clone(),
                Some(Expr::raw(format!("{} = {mm_value}", quote_column(&mm_alias, "id")))),
            ),
            Some(target.clone()),
        );
        if multiple {
            self.multi = true;
        }
        self.advance(target, alias, idx, mm_alias);
        Ok(())
    }

    fn back_relation_hop(&mut self, segment: &str, name: &str, field_name: &str) -> ResolveResult<()> {
        let current = self.collection.clone();
        let back = self
            .resolver
            .lookup_collection(name)
            .ok_or_else(|| self.unknown(format!("unknown back-relation collection {name:?}")))?;
        let back_field = back
            .field(field_name)
            .ok_or_else(|| self.unknown(format!("{:?} has no field {field_name:?}", back.name)))?;
        let Some(options) = back_field.relation_options() else {
            return Err(self.unknown(format!("{}.{field_name} is not a relation field", back.name)));
        };
        if !current.matches(&options.collection_id) {
            return Err(self.unknown(format!(
                "{}.{field_name} does not reference {:?}",
                back.name, current.name
            )));
        }
        self.check_hidden(&back, back_field)?;
        self.count_hop()?;

        let multiple = back_field.is_multiple() || !options.unique;
        let column = columnify(field_name);
        let parent_id = quote_column(&self.alias, "id");
        let mm_parent_id = quote_column(&self.mm_alias, "id");

        let hint = format!("{}_{}", self.alias, columnify(segment));
        let key = JoinKey::new(
            self.origin.clone(),
            JoinEdge::BackRelation {
                collection: back.id.clone(),
                field: field_name.to_string(),
            },
        );
        let scope_target = back.clone();
        let on_column = column.clone();
        let (idx, alias) = self.resolver.join(key, &hint, move |r, alias| {
            let on = back_relation_on(alias, &on_column, &parent_id, multiple);
            let scope = r.scope_join(&scope_target, alias)?;
            Ok(JoinSpec::table(&scope_target.name)
                .on(and_scope(on, scope))
                .multi_valued(multiple))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(
            JoinClause::new(
                Expr::raw(quote_ident(&back.name)),
                mm_alias.clone(),
                Some(back_relation_on(&mm_alias, &column, &mm_parent_id, multiple)),
            ),
            Some(back.clone()),
        );
        if multiple {
            self.multi = true;
        }
        self.advance(back, alias, idx, mm_alias);
        Ok(())
    }

    /// Register `json_each` over a field of the current node. Returns the
    /// join alias and its multi-match copy.
    fn json_each(&mut self, field_name: &str) -> ResolveResult<(String, String)> {
        let column = columnify(field_name);
        let source = quote_column(&self.alias, &column);
        let hint = format!("__je_{}_{column}", self.alias.trim_start_matches('_'));
        let key = JoinKey::new(self.origin.clone(), JoinEdge::JsonEach(field_name.to_string()));
        let (_, alias) = self.resolver.join(key, &hint, move |_, _| {
            Ok(JoinSpec::new(Expr::raw(json::json_each(&source))).multi_valued(true))
        })?;

        let mm_alias = clone_alias(&alias);
        self.mm.push_join(
            JoinClause::new(
                Expr::raw(json::json_each(&quote_column(&self.mm_alias, &column))),
                mm_alias.clone(),
                None,
            ),
            None,
        );
        Ok((alias, mm_alias))
    }

    fn last_prop(mut self, name: &str, modifier: Option<Modifier>) -> ResolveResult<ResolvedField> {
        let collection = self.collection.clone();
        let field = collection
            .field(name)
            .ok_or_else(|| self.unknown(format!("{:?} has no field {name:?}", collection.name)))?;
        self.check_hidden(&collection, field)?;

        let column = columnify(&field.name);
        let col = quote_column(&self.alias, &column);
        let mm_col = quote_column(&self.mm_alias, &column);

        match modifier {
            Some(m @ (Modifier::Isset | Modifier::Changed)) => {
                return Err(ResolveError::invalid_format(
                    self.path,
                    format!(":{m} is only supported for @request.body fields"),
                ));
            }
            Some(m @ (Modifier::Each | Modifier::Length)) if !field.is_multiple() => {
                return Err(ResolveError::invalid_format(
                    self.path,
                    format!(":{m} requires a multi-valued field, {name:?} is single-valued"),
                ));
            }
            Some(Modifier::Length) => {
                if self.multi {
                    self.mm.set_value(json::json_array_length(&mm_col));
                }
                return self.finish(ResolvedField::column(json::json_array_length(&col)));
            }
            Some(Modifier::Each) => {
                let (je, mm_je) = self.json_each(&field.name)?;
                self.mm.set_value(quote_column(&mm_je, "value"));
                self.multi = true;
                return self.finish(ResolvedField::column(quote_column(&je, "value")));
            }
            Some(Modifier::Lower) | None => {}
        }

        let mut result = ResolvedField::column(col.clone());
        let mut mm_value = mm_col.clone();
        if field.is_json() {
            result.identifier = json::json_extract(&col, "");
            result.no_coalesce = true;
            mm_value = json::json_extract(&mm_col, "");
        }
        if modifier == Some(Modifier::Lower) {
            result.identifier = format!("LOWER({})", result.identifier);
            mm_value = format!("LOWER({mm_value})");
        }
        if collection.is_auth() && field.name == FIELD_EMAIL && !self.resolver.context.allow_hidden_fields {
            result.visibility_guard = Some(quote_column(&self.alias, FIELD_EMAIL_VISIBILITY));
        }
        self.mm.set_value(mm_value);
        self.finish(result)
    }

    fn json_path(
        mut self,
        field: &Field,
        keys: &[String],
        modifier: Option<Modifier>,
    ) -> ResolveResult<ResolvedField> {
        if let Some(m @ (Modifier::Isset | Modifier::Changed | Modifier::Each | Modifier::Length)) =
            modifier
        {
            return Err(ResolveError::invalid_format(
                self.path,
                format!(":{m} is not supported inside JSON fields"),
            ));
        }
        let column = columnify(&field.name);
        let path = json::json_path(keys);
        let mut result = ResolvedField::column(json::json_extract(
            &quote_column(&self.alias, &column),
            &path,
        ));
        result.no_coalesce = true;
        let mut mm_value = json::json_extract(&quote_column(&self.mm_alias, &column), &path);
        if modifier == Some(Modifier::Lower) {
            result.identifier = format!("LOWER({})", result.identifier);
            mm_value = format!("LOWER({mm_value})");
        }
        self.mm.set_value(mm_value);
        self.finish(result)
    }

    fn finish(mut self, mut result: ResolvedField) -> ResolveResult<ResolvedField> {
        if self.multi {
            self.resolver.finalize_multi_match(&mut self.mm)?;
            result.multi_match = Some(self.mm);
        }
        Ok(result)
    }

    fn advance(&mut self, collection: Arc<Collection>, alias: String, idx: usize, mm_alias: String) {
        self.collection = collection;
        self.alias = alias;
        self.origin = JoinOrigin::Node(idx);
        self.mm_alias = mm_alias;
    }

    fn count_hop(&mut self) -> ResolveResult<()> {
        let max = self.resolver.config.max_relation_depth;
        if self.hops >= max {
            return Err(ResolveError::MaxDepthExceeded {
                path: self.path.to_string(),
                max,
            });
        }
        self.hops += 1;
        Ok(())
    }

    fn check_hidden(&self, collection: &Collection, field: &Field) -> ResolveResult<()> {
        if field.hidden && !self.resolver.context.allow_hidden_fields {
            return Err(ResolveError::PermissionDenied(format!(
                "field {:?} of collection {:?} is hidden",
                field.name, collection.name
            )));
        }
        Ok(())
    }

    fn target_collection(&self, field: &Field, options: &RelationOptions) -> ResolveResult<Arc<Collection>> {
        self.resolver
            .lookup_collection(&options.collection_id)
            .ok_or_else(|| {
                self.unknown(format!(
                    "relation {:?} targets missing collection {:?}",
                    field.name, options.collection_id
                ))
            })
    }

    fn unknown(&self, reason: String) -> ResolveError {
        ResolveError::unknown_field(self.path, reason)
    }
}

/// Join condition of a back-relation. A multi-valued back field stores ids as
/// a JSON array, so the parent id is searched among its elements.
fn back_relation_on(alias: &str, column: &str, parent_id: &str, multiple: bool) -> Expr {
    let source = quote_column(alias, column);
    if multiple {
        let je = format!("__je_{}", alias.trim_start_matches('_'));
        Expr::raw(format!(
            "{parent_id} IN (SELECT {} FROM {} AS {})",
            quote_column(&je, "value"),
            json::json_each(&source),
            quote_ident(&je)
        ))
    } else {
        Expr::raw(format!("{source} = {parent_id}"))
    }
}

/// AND a collection rule into a join condition.
pub(crate) fn and_scope(on: Expr, scope: Option<Expr>) -> Expr {
    match scope {
        Some(scope) => Expr::and(vec![on, scope]),
        None => on,
    }
}
