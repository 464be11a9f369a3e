//! Filter AST to SQL.

use basekit_lang::{Comparison, FilterExpr, Operand, SignOp};
use serde_json::Value;

use super::FieldResolver;
use crate::catalog::number_value;
use crate::query::{quote_column, quote_ident, Expr, Params};
use crate::resolver::{MultiMatchSubquery, ResolveResult, ResolvedField, MULTI_MATCH_VALUE};

/// Compile a filter expression into a SQL condition.
///
/// On error the resolver is rolled back to where it was before the call, so
/// operands resolved ahead of the failing one leave no joins behind.
pub fn build_expr(expr: &FilterExpr, resolver: &mut dyn FieldResolver) -> ResolveResult<Expr> {
    let checkpoint = resolver.checkpoint();
    let result = build_node(expr, resolver);
    if result.is_err() {
        resolver.rollback(checkpoint);
    }
    result
}

fn build_node(expr: &FilterExpr, resolver: &mut dyn FieldResolver) -> ResolveResult<Expr> {
    match expr {
        FilterExpr::Comparison(comparison) => build_comparison(comparison, resolver),
        FilterExpr::And(items) => Ok(Expr::and(build_all(items, resolver)?)),
        FilterExpr::Or(items) => Ok(Expr::or(build_all(items, resolver)?)),
    }
}

fn build_all(items: &[FilterExpr], resolver: &mut dyn FieldResolver) -> ResolveResult<Vec<Expr>> {
    items.iter().map(|item| build_node(item, &mut *resolver)).collect()
}

fn build_comparison(c: &Comparison, resolver: &mut dyn FieldResolver) -> ResolveResult<Expr> {
    let left = resolve_operand(&c.left.value, resolver)?;
    let right = resolve_operand(&c.right.value, resolver)?;
    Ok(build_resolved(&left, c.op, &right, resolver))
}

fn resolve_operand(operand: &Operand, resolver: &mut dyn FieldResolver) -> ResolveResult<ResolvedField> {
    Ok(match operand {
        Operand::Identifier(path) => resolver.resolve(path)?,
        Operand::Text(text) => resolver.bind(Value::String(text.clone())),
        Operand::Number(n) => resolver.bind(number_value(*n).unwrap_or(Value::Null)),
        Operand::Bool(true) => ResolvedField::literal("1"),
        Operand::Bool(false) => ResolvedField::literal("0"),
        Operand::Null => ResolvedField::literal("NULL"),
    })
}

/// Compare two resolved operands.
///
/// Without the `?` prefix a multi-valued operand must match with every
/// element, which is enforced with a `NOT EXISTS` over its multi-match
/// subquery. Visibility guards of either side are ANDed last.
fn build_resolved(
    left: &ResolvedField,
    op: SignOp,
    right: &ResolvedField,
    resolver: &mut dyn FieldResolver,
) -> Expr {
    let base = op.base();
    let mut expr = compare(left, base, right);

    if !op.is_any() {
        let all = match (&left.multi_match, &right.multi_match) {
            (Some(l), Some(r)) => Some(many_vs_many(l, left, base, r, right, resolver)),
            (Some(l), None) => Some(many_vs_one(l, left, base, right, false, resolver)),
            (None, Some(r)) => Some(many_vs_one(r, right, base, left, true, resolver)),
            (None, None) => None,
        };
        if let Some(all) = all {
            expr = Expr::and(vec![expr, all]).enclose();
        }
    }

    for guard in [&left.visibility_guard, &right.visibility_guard].into_iter().flatten() {
        expr = Expr::and(vec![expr, Expr::raw(format!("{guard} = TRUE"))]).enclose();
    }
    expr
}

/// A single comparison, no multi-match handling.
fn compare(left: &ResolvedField, op: SignOp, right: &ResolvedField) -> Expr {
    match op {
        SignOp::Eq => equal_expr(true, left, right),
        SignOp::Ne => equal_expr(false, left, right),
        SignOp::Like | SignOp::NotLike => {
            let not = if op == SignOp::NotLike { "NOT " } else { "" };
            if right.params.is_empty() {
                // column operand, wrap at query time
                Expr::new(
                    format!(
                        "{} {not}LIKE ('%' || {} || '%') ESCAPE '\\'",
                        left.identifier, right.identifier
                    ),
                    merge(&left.params, &right.params),
                )
            } else {
                Expr::new(
                    format!("{} {not}LIKE {} ESCAPE '\\'", left.identifier, right.identifier),
                    merge(&left.params, &like_params(&right.params)),
                )
            }
        }
        _ => {
            let sign = match op {
                SignOp::Lt => "<",
                SignOp::Le => "<=",
                SignOp::Gt => ">",
                _ => ">=",
            };
            Expr::new(
                format!("{} {sign} {}", left.identifier, right.identifier),
                merge(&left.params, &right.params),
            )
        }
    }
}

/// Equality with NULL and `''` treated as the same "empty" value.
///
/// Inequality uses `IS NOT` throughout so a NULL operand still compares as
/// distinct from a non-NULL one instead of yielding NULL.
fn equal_expr(equal: bool, left: &ResolvedField, right: &ResolvedField) -> Expr {
    let (eq, null_eq, concat, null_check) = if equal {
        ("=", "IS", "OR", "IS NULL")
    } else {
        ("IS NOT", "IS NOT", "AND", "IS NOT NULL")
    };
    let params = merge(&left.params, &right.params);
    let (l, r) = (&left.identifier, &right.identifier);

    if left.no_coalesce || right.no_coalesce {
        return Expr::new(format!("{l} {null_eq} {r}"), params);
    }

    let left_empty = is_empty(left);
    let right_empty = is_empty(right);
    if left_empty && right_empty {
        return Expr::new(format!("'' {eq} ''"), params);
    }

    if is_known_non_empty(left) || is_known_non_empty(right) {
        let l = if left_empty { "''" } else { l.as_str() };
        let r = if right_empty { "''" } else { r.as_str() };
        return Expr::new(format!("{l} {eq} {r}"), params);
    }

    if left_empty {
        return Expr::new(format!("('' {eq} {r} {concat} {r} {null_check})"), params);
    }
    if right_empty {
        return Expr::new(format!("({l} {eq} '' {concat} {l} {null_check})"), params);
    }

    Expr::new(format!("COALESCE({l}, '') {eq} COALESCE({r}, '')"), params)
}

fn is_empty_identifier(field: &ResolvedField) -> bool {
    matches!(
        field.identifier.to_ascii_lowercase().as_str(),
        "" | "null" | "''" | "\"\"" | "[]" | "{}"
    )
}

fn has_empty_param(field: &ResolvedField) -> bool {
    field.params.values().any(|v| match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    })
}

fn is_empty(field: &ResolvedField) -> bool {
    is_empty_identifier(field) || (field.params.len() == 1 && has_empty_param(field))
}

fn is_known_non_empty(field: &ResolvedField) -> bool {
    if matches!(
        field.identifier.to_ascii_lowercase().as_str(),
        "1" | "0" | "true" | "false"
    ) {
        return true;
    }
    !field.params.is_empty() && !has_empty_param(field) && !is_empty_identifier(field)
}

/// Every element of `multi` must satisfy the comparison against `other`.
fn many_vs_one(
    sub: &MultiMatchSubquery,
    multi: &ResolvedField,
    op: SignOp,
    other: &ResolvedField,
    inverse: bool,
    resolver: &mut dyn FieldResolver,
) -> Expr {
    let alias = resolver.next_alias("__sm");
    let value = element(&alias, multi);
    let other = ResolvedField {
        identifier: other.identifier.clone(),
        params: other.params.clone(),
        no_coalesce: other.no_coalesce,
        ..ResolvedField::default()
    };
    let cmp = if inverse {
        compare(&other, op, &value)
    } else {
        compare(&value, op, &other)
    };
    let sub = sub.build();
    Expr::new(
        format!(
            "NOT EXISTS (SELECT 1 FROM ({}) AS {} WHERE NOT ({}))",
            sub.sql,
            quote_ident(&alias),
            cmp.sql
        ),
        merge(&sub.params, &cmp.params),
    )
}

/// Every pair of elements must satisfy the comparison.
fn many_vs_many(
    left_sub: &MultiMatchSubquery,
    left: &ResolvedField,
    op: SignOp,
    right_sub: &MultiMatchSubquery,
    right: &ResolvedField,
    resolver: &mut dyn FieldResolver,
) -> Expr {
    let left_alias = resolver.next_alias("__ml");
    let right_alias = resolver.next_alias("__mr");
    let cmp = compare(&element(&left_alias, left), op, &element(&right_alias, right));
    let (l, r) = (left_sub.build(), right_sub.build());

    let mut params = merge(&l.params, &r.params);
    params.extend(cmp.params);
    Expr::new(
        format!(
            "NOT EXISTS (SELECT 1 FROM ({}) AS {} LEFT JOIN ({}) AS {} WHERE NOT ({}))",
            l.sql,
            quote_ident(&left_alias),
            r.sql,
            quote_ident(&right_alias),
            cmp.sql
        ),
        params,
    )
}

/// The element column of a multi-match subquery aliased as `alias`.
fn element(alias: &str, source: &ResolvedField) -> ResolvedField {
    ResolvedField {
        identifier: quote_column(alias, MULTI_MATCH_VALUE),
        no_coalesce: source.no_coalesce,
        ..ResolvedField::default()
    }
}

fn merge(a: &Params, b: &Params) -> Params {
    let mut out = a.clone();
    out.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}

/// Wrap LIKE parameters in `%...%` unless they already contain a wildcard.
fn like_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            let text = if contains_unescaped(&text, '%') {
                text
            } else {
                format!("%{}%", escape_unescaped(&text, &['\\', '%', '_']))
            };
            (name.clone(), Value::String(text))
        })
        .collect()
}

fn contains_unescaped(s: &str, ch: char) -> bool {
    let mut prev = None;
    for c in s.chars() {
        if c == ch && prev != Some('\\') {
            return true;
        }
        prev = Some(c);
    }
    false
}

/// Backslash-escape `chars` that are not escaped already.
fn escape_unescaped(s: &str, chars: &[char]) -> String {
    let input: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 2);
    let mut i = 0;
    while i < input.len() {
        let c = input[i];
        if c == '\\' && i + 1 < input.len() && chars.contains(&input[i + 1]) {
            out.push(c);
            out.push(input[i + 1]);
            i += 2;
            continue;
        }
        if chars.contains(&c) {
            out.push('\\');
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectQuery;
    use crate::resolver::{ResolveError, MultiMatchSubquery};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Resolves `col_*` to plain columns, `json_*` to no-coalesce columns and
    /// `email` to a guarded column.
    #[derive(Default)]
    struct TestResolver {
        params: usize,
        aliases: usize,
        resolved: Vec<String>,
    }

    impl FieldResolver for TestResolver {
        fn resolve(&mut self, path: &str) -> ResolveResult<ResolvedField> {
            let mut field = ResolvedField::column(format!("`t`.`{path}`"));
            if path.starts_with("json_") {
                field.no_coalesce = true;
            } else if path == "email" {
                field.visibility_guard = Some("`t`.`emailVisibility`".into());
            } else if path.starts_with("many_") {
                let mut sub = MultiMatchSubquery::new("t", "t");
                sub.set_value(format!("`__mm_t`.`{path}`"));
                field.multi_match = Some(sub);
            } else if !path.starts_with("col_") {
                return Err(ResolveError::unknown_field(path, "unknown"));
            }
            self.resolved.push(path.to_string());
            Ok(field)
        }

        fn bind(&mut self, value: Value) -> ResolvedField {
            let name = format!("p{}", self.params);
            self.params += 1;
            ResolvedField::param(&name, value)
        }

        fn next_alias(&mut self, prefix: &str) -> String {
            self.aliases += 1;
            format!("{prefix}{}", self.aliases)
        }

        fn update_query(&self, _query: &mut SelectQuery) -> ResolveResult<()> {
            Ok(())
        }

        fn checkpoint(&self) -> usize {
            self.resolved.len()
        }

        fn rollback(&mut self, checkpoint: usize) {
            self.resolved.truncate(checkpoint);
        }
    }

    fn build(filter: &str) -> Expr {
        let ast = basekit_lang::parse_filter(filter).unwrap();
        build_expr(&ast, &mut TestResolver::default()).unwrap()
    }

    #[test]
    fn test_equality_forms() {
        assert_eq!(build("col_a = 'x'").sql, "`t`.`col_a` = {:p0}");
        assert_eq!(build("col_a = true").sql, "`t`.`col_a` = 1");
        assert_eq!(build("col_a = ''").sql, "(`t`.`col_a` = '' OR `t`.`col_a` IS NULL)");
        assert_eq!(
            build("null != col_a").sql,
            "('' IS NOT `t`.`col_a` AND `t`.`col_a` IS NOT NULL)"
        );
        assert_eq!(build("col_a != 'x'").sql, "`t`.`col_a` IS NOT {:p0}");
        assert_eq!(
            build("col_a != col_b").sql,
            "COALESCE(`t`.`col_a`, '') IS NOT COALESCE(`t`.`col_b`, '')"
        );
        assert_eq!(build("'' = null").sql, "'' = ''");
        assert_eq!(
            build("col_a = col_b").sql,
            "COALESCE(`t`.`col_a`, '') = COALESCE(`t`.`col_b`, '')"
        );
        assert_eq!(build("json_a = null").sql, "`t`.`json_a` IS NULL");
        assert_eq!(build("json_a != 1").sql, "`t`.`json_a` IS NOT {:p0}");
    }

    #[test]
    fn test_ordering_and_numbers() {
        let expr = build("col_a >= 1.5");
        assert_eq!(expr.sql, "`t`.`col_a` >= {:p0}");
        assert_eq!(expr.params.get("p0"), Some(&json!(1.5)));
        assert_eq!(build("col_a < 3").params.get("p0"), Some(&json!(3)));
    }

    #[test]
    fn test_like() {
        let expr = build("col_a ~ 'a_b'");
        assert_eq!(expr.sql, "`t`.`col_a` LIKE {:p0} ESCAPE '\\'");
        assert_eq!(expr.params.get("p0"), Some(&json!("%a\\_b%")));

        let expr = build("col_a !~ 'abc%'");
        assert_eq!(expr.sql, "`t`.`col_a` NOT LIKE {:p0} ESCAPE '\\'");
        assert_eq!(expr.params.get("p0"), Some(&json!("abc%")));

        assert_eq!(
            build("col_a ~ col_b").sql,
            "`t`.`col_a` LIKE ('%' || `t`.`col_b` || '%') ESCAPE '\\'"
        );
    }

    #[test]
    fn test_and_or_grouping() {
        assert_eq!(
            build("col_a = 1 && (col_b = 2 || col_c = 3)").sql,
            "(`t`.`col_a` = {:p0}) AND ((`t`.`col_b` = {:p1}) OR (`t`.`col_c` = {:p2}))"
        );
    }

    #[test]
    fn test_visibility_guard() {
        assert_eq!(
            build("email = 'a@b.c'").sql,
            "((`t`.`email` = {:p0}) AND (`t`.`emailVisibility` = TRUE))"
        );
    }

    #[test]
    fn test_multi_match() {
        let expr = build("many_a > 1");
        assert_eq!(
            expr.sql,
            "((`t`.`many_a` > {:p0}) AND (NOT EXISTS (SELECT 1 FROM (SELECT `__mm_t`.`many_a` AS `multiMatchValue` FROM `t` AS `__mm_t` WHERE `__mm_t`.`id` = `t`.`id`) AS `__sm1` WHERE NOT (`__sm1`.`multiMatchValue` > {:p0}))))"
        );

        // inverted when the multi-valued operand is on the right
        let expr = build("1 < many_a");
        assert!(expr.sql.contains("WHERE NOT ({:p0} < `__sm1`.`multiMatchValue`)"));

        // any-match operators skip the subquery
        assert_eq!(build("many_a ?> 1").sql, "`t`.`many_a` > {:p0}");

        let expr = build("many_a = many_b");
        assert!(expr.sql.contains("AS `__ml1` LEFT JOIN"));
        assert!(expr.sql.contains("AS `__mr2` WHERE NOT"));
    }

    #[test]
    fn test_unknown_field_rolls_back() {
        let mut resolver = TestResolver::default();
        let ast = basekit_lang::parse_filter("col_a = 1").unwrap();
        build_expr(&ast, &mut resolver).unwrap();

        let ast = basekit_lang::parse_filter("col_b = 1 && (col_c = 2 || nope = 3)").unwrap();
        assert!(matches!(
            build_expr(&ast, &mut resolver),
            Err(ResolveError::UnknownField { .. })
        ));
        assert_eq!(resolver.resolved, vec!["col_a"]);
    }

    #[test]
    fn test_escape_unescaped() {
        assert_eq!(escape_unescaped("a%b", &['\\', '%', '_']), "a\\%b");
        assert_eq!(escape_unescaped("a\\%b", &['\\', '%', '_']), "a\\%b");
        assert_eq!(escape_unescaped("a\\b", &['\\', '%', '_']), "a\\\\b");
        assert!(contains_unescaped("50%", '%'));
        assert!(!contains_unescaped("50\\%", '%'));
    }
}
