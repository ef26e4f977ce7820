//! SQL text helpers shared by the engine and the identity layer.
//!
//! # Invariants
//! - `quote_identifier` is idempotent.
//! - Columns, placeholders, SET pairs and values built from the same `Row`
//!   line up positionally; callers must not mutate the row in between.

use crate::model::Row;
use rusqlite::types::Value;

pub const QUOTE: char = '"';

/// Wraps an identifier in double quotes unless it is empty or already quoted.
pub fn quote_identifier(value: &str) -> String {
    if value.is_empty() || value.starts_with(QUOTE) {
        return value.to_string();
    }
    format!("{QUOTE}{value}{QUOTE}")
}

/// `"schema"."table"` when a schema is set, `"table"` otherwise.
pub fn qualified_table_name(table: Option<&str>, schema: Option<&str>) -> Option<String> {
    let table = quote_identifier(table?);
    match schema {
        Some(schema) => Some(format!("{}.{}", quote_identifier(schema), table)),
        None => Some(table),
    }
}

/// Comma-joined quoted column names: `"c1","c2"`.
pub fn generate_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(",")
}

/// Comma-joined positional placeholders: `?,?,?`.
pub fn generate_parameters(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// Comma-joined assignments for UPDATE clauses: `"c1"=?,"c2"=?`.
pub fn generate_set_parameters<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|column| format!("{}=?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Row values in column order.
pub fn generate_values(row: &Row) -> Vec<Value> {
    row.values().cloned().collect()
}

/// ` WHERE <filter>` for a non-empty filter, empty otherwise.
pub(crate) fn where_clause(filter: Option<&str>) -> String {
    match filter {
        Some(filter) if !filter.trim().is_empty() => format!(" WHERE {filter}"),
        _ => String::new(),
    }
}
