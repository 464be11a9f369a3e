//! `basekit explain`: compile a search against a schema and show the SQL.

use std::sync::Arc;

use basekit_core::resolver::{RecordFieldResolver, ResolverContext};
use basekit_core::{Params, RequestInfo, ResolverConfig, SchemaBundle, SearchQuery};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CliError;

/// Everything `explain` needs besides the schema.
#[derive(Debug, Clone, Default)]
pub struct ExplainRequest {
    pub collection: String,
    pub filters: Vec<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub request: Option<RequestInfo>,
    pub superuser: bool,
    pub config: ResolverConfig,
}

/// A registered join, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinSummary {
    pub alias: String,
    pub table: String,
    pub on: Option<String>,
    pub multi_valued: bool,
}

/// The compiled query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub collection: String,
    pub sql: String,
    pub params: Params,
    pub joins: Vec<JoinSummary>,
    pub distinct: bool,
}

/// Compile a search into SQL.
pub fn explain(schema: Arc<SchemaBundle>, req: ExplainRequest) -> Result<Explanation, CliError> {
    let base = schema
        .collection(&req.collection)
        .ok_or_else(|| CliError::UnknownCollection(req.collection.clone()))?;

    let mut context = ResolverContext::new(base.clone()).with_allow_hidden_fields(req.superuser);
    if let Some(request) = req.request {
        context = context.with_request_info(request);
    }
    let mut resolver = RecordFieldResolver::new(schema, context).with_config(req.config);

    let mut search = SearchQuery::new();
    for filter in req.filters {
        search = search.with_filter(filter);
    }
    if let Some(sort) = &req.sort {
        search = search.with_sort(sort);
    }
    if let Some(limit) = req.limit {
        search = search.with_limit(limit);
    }
    if let Some(offset) = req.offset {
        search = search.with_offset(offset);
    }
    debug!(?search, "compiling search");

    let mut query = resolver.base_query();
    search.apply(&mut resolver, &mut query)?;
    let built = query.build();

    let joins = resolver
        .joins()
        .nodes()
        .iter()
        .map(|node| JoinSummary {
            alias: node.alias.clone(),
            table: node.table.sql.clone(),
            on: node.on.as_ref().map(|on| on.sql.clone()),
            multi_valued: node.multi_valued,
        })
        .collect::<Vec<_>>();
    info!(collection = %base.name, joins = joins.len(), params = built.params.len(), "search compiled");

    Ok(Explanation {
        collection: base.name.clone(),
        sql: built.sql,
        params: built.params,
        joins,
        distinct: query.is_distinct(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use basekit_core::{Collection, Field, RelationOptions, Rule};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Arc<SchemaBundle> {
        Arc::new(
            SchemaBundle::new(1)
                .with_collection(Collection::auth("users").with_read_rule(Rule::Public))
                .with_collection(Collection::new("secrets").with_field(Field::text("value")))
                .with_collection(
                    Collection::new("posts")
                        .with_read_rule(Rule::Public)
                        .with_field(Field::text("title"))
                        .with_field(Field::relation("author", RelationOptions::new("users")))
                        .with_field(Field::relation("secret", RelationOptions::new("secrets"))),
                ),
        )
    }

    fn request(filter: &str) -> ExplainRequest {
        ExplainRequest {
            collection: "posts".into(),
            filters: vec![filter.into()],
            ..ExplainRequest::default()
        }
    }

    #[test]
    fn test_explain() {
        let explanation = explain(
            schema(),
            ExplainRequest {
                sort: Some("-created".into()),
                limit: Some(20),
                ..request("author.verified = true && title ~ 'rust'")
            },
        )
        .unwrap();

        assert_eq!(
            explanation.sql,
            "SELECT `posts`.* FROM `posts` \
             LEFT JOIN `users` AS `posts_author` ON `posts_author`.`id` = `posts`.`author` \
             WHERE (`posts_author`.`verified` = 1) AND (`posts`.`title` LIKE {:p0} ESCAPE '\\') \
             ORDER BY `posts`.`created` DESC LIMIT 20"
        );
        assert_eq!(explanation.params.get("p0"), Some(&json!("%rust%")));
        assert_eq!(explanation.joins.len(), 1);
        assert_eq!(explanation.joins[0].alias, "posts_author");
        assert!(!explanation.distinct);
    }

    #[test]
    fn test_superuser() {
        let err = explain(schema(), request("secret.value = 'x'")).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let explanation = explain(
            schema(),
            ExplainRequest {
                superuser: true,
                ..request("secret.value = 'x'")
            },
        )
        .unwrap();
        assert_eq!(explanation.joins[0].alias, "posts_secret");
    }

    #[test]
    fn test_request_values() {
        let explanation = explain(
            schema(),
            ExplainRequest {
                request: Some(RequestInfo::new("GET").with_query("q", "hello")),
                ..request("title = @request.query.q")
            },
        )
        .unwrap();
        assert!(explanation.sql.ends_with("WHERE `posts`.`title` = {:p0}"));
        assert_eq!(explanation.params.get("p0"), Some(&json!("hello")));
    }

    #[test]
    fn test_unknown_collection() {
        let err = explain(
            schema(),
            ExplainRequest {
                collection: "nope".into(),
                ..ExplainRequest::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, CliError::UnknownCollection(_)));
    }
}
