//! Sort expressions: `-created,title`.

use super::FieldResolver;
use crate::resolver::{ResolveError, ResolveResult};

/// Sort by a random order.
pub const RANDOM_SORT_KEY: &str = "@random";
/// Sort by SQLite row id.
pub const ROWID_SORT_KEY: &str = "@rowid";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A single sort term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub direction: SortDirection,
}

impl SortField {
    /// Parse a comma separated sort string. A `-` prefix sorts descending,
    /// `+` or no prefix ascending. Blank terms are skipped.
    pub fn parse_list(sort: &str) -> Vec<SortField> {
        sort.split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| match term.strip_prefix('-') {
                Some(name) => SortField {
                    name: name.to_string(),
                    direction: SortDirection::Desc,
                },
                None => SortField {
                    name: term.trim_start_matches('+').to_string(),
                    direction: SortDirection::Asc,
                },
            })
            .collect()
    }

    /// Compile to an ORDER BY term.
    ///
    /// Multi-valued paths are rejected, they have no single value to sort by.
    pub fn build_expr(&self, resolver: &mut dyn FieldResolver) -> ResolveResult<String> {
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        match self.name.as_str() {
            RANDOM_SORT_KEY => return Ok("RANDOM()".to_string()),
            ROWID_SORT_KEY => return Ok(format!("_rowid_ {direction}")),
            _ => {}
        }

        let field = resolver.resolve(&self.name)?;
        if field.is_multi_valued() {
            return Err(ResolveError::InvalidQuery(format!(
                "cannot sort by multi-valued field {:?}",
                self.name
            )));
        }
        if !field.params.is_empty() {
            return Err(ResolveError::InvalidQuery(format!(
                "cannot sort by request value {:?}",
                self.name
            )));
        }
        Ok(format!("{} {direction}", field.identifier))
    }
}
