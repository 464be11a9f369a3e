//! Output formatters for compiled queries.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::Value;

use crate::explain::Explanation;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// SQL followed by its parameters
    Text,
    /// Pretty-printed JSON
    Json,
    /// ASCII tables of joins and parameters
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

/// Render an explanation.
pub fn format_explanation(format: OutputFormat, explanation: &Explanation) -> String {
    match format {
        OutputFormat::Text => format_text(explanation),
        OutputFormat::Json => serde_json::to_string_pretty(explanation).unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Table => format_tables(explanation),
    }
}

fn format_text(explanation: &Explanation) -> String {
    let mut output = explanation.sql.clone();
    for (name, value) in &explanation.params {
        output.push_str(&format!("\n  {name} = {}", display_value(value)));
    }
    output
}

fn format_tables(explanation: &Explanation) -> String {
    let mut output = explanation.sql.clone();

    if !explanation.joins.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["alias", "table", "on", "multi"]);
        for join in &explanation.joins {
            table.add_row(vec![
                Cell::new(&join.alias),
                Cell::new(&join.table),
                Cell::new(join.on.as_deref().unwrap_or("")),
                Cell::new(if join.multi_valued { "yes" } else { "no" }),
            ]);
        }
        output.push_str("\n\n");
        output.push_str(&table.to_string());
    }

    if !explanation.params.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["param", "value"]);
        for (name, value) in &explanation.params {
            table.add_row(vec![Cell::new(name), Cell::new(display_value(value))]);
        }
        output.push_str("\n\n");
        output.push_str(&table.to_string());
    }

    output
}

/// Parameter values as they would be typed in a filter.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        other => other.to_string(),
    }
}
