//! SQLite JSON helper expressions.

/// Normalize a column that may hold a JSON array, a scalar or a blank value
/// into a JSON array expression.
fn as_json_array(column: &str, blank_as_empty: bool) -> String {
    let fallback = if blank_as_empty {
        format!("(CASE WHEN {column} = '' OR {column} IS NULL THEN json_array() ELSE json_array({column}) END)")
    } else {
        format!("json_array({column})")
    };
    format!(
        "CASE WHEN iif(json_valid({column}), json_type({column})='array', FALSE) THEN {column} ELSE {fallback} END"
    )
}

/// Table-valued `json_each` over a possibly multi-valued column.
pub fn json_each(column: &str) -> String {
    format!("json_each({})", as_json_array(column, false))
}

/// Number of elements stored in a possibly multi-valued column. Blank values
/// count as zero elements, scalars as one.
pub fn json_array_length(column: &str) -> String {
    format!("json_array_length({})", as_json_array(column, true))
}

/// Extract a path from a JSON column. Non-JSON values are treated as a
/// scalar root so that an empty path returns the value itself.
///
/// `path` uses SQLite syntax without the leading `$`, e.g. `a.b[0]`.
pub fn json_extract(column: &str, path: &str) -> String {
    let path = if path.is_empty() || path.starts_with('[') {
        path.to_string()
    } else {
        format!(".{path}")
    };
    format!(
        "(CASE WHEN json_valid({column}) THEN JSON_EXTRACT({column}, '${path}') ELSE JSON_EXTRACT(json_object('pb', {column}), '$.pb{path}') END)"
    )
}

/// Build a JSON path from field path segments. Numeric segments index arrays.
pub fn json_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for segment in segments {
        let segment = segment.as_ref();
        if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_each() {
        assert_eq!(
            json_each("`t`.`tags`"),
            "json_each(CASE WHEN iif(json_valid(`t`.`tags`), json_type(`t`.`tags`)='array', FALSE) THEN `t`.`tags` ELSE json_array(`t`.`tags`) END)"
        );
    }

    #[test]
    fn test_json_array_length() {
        assert_eq!(
            json_array_length("c"),
            "json_array_length(CASE WHEN iif(json_valid(c), json_type(c)='array', FALSE) THEN c ELSE (CASE WHEN c = '' OR c IS NULL THEN json_array() ELSE json_array(c) END) END)"
        );
    }

    #[test]
    fn test_json_extract() {
        assert_eq!(
            json_extract("c", "a.b"),
            "(CASE WHEN json_valid(c) THEN JSON_EXTRACT(c, '$.a.b') ELSE JSON_EXTRACT(json_object('pb', c), '$.pb.a.b') END)"
        );
        assert_eq!(
            json_extract("c", ""),
            "(CASE WHEN json_valid(c) THEN JSON_EXTRACT(c, '$') ELSE JSON_EXTRACT(json_object('pb', c), '$.pb') END)"
        );
    }

    #[test]
    fn test_json_path() {
        assert_eq!(json_path(&["a", "0", "b"]), "a[0].b");
        assert_eq!(json_path(&["1", "x"]), "[1].x");
        assert_eq!(json_path::<&str>(&[]), "");
    }
}
