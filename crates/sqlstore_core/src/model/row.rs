//! Ordered column map used as the storage-format record.
//!
//! # Invariants
//! - Column order is insertion order; re-inserting a column keeps its slot.
//! - Column names are unique within a row.

use rusqlite::types::Value;

/// One table record in storage format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value, returning the previous value when the column existed.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((column, value));
                None
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(name, _)| name == column)?;
        Some(self.entries.remove(position).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Reads a text column.
    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Reads an integer column.
    pub fn get_integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Reads every column of a result row into a `Row`.
pub(crate) fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let statement: &rusqlite::Statement<'_> = row.as_ref();
    let mut result = Row::new();
    for index in 0..statement.column_count() {
        let name = statement.column_name(index)?.to_string();
        let value: Value = row.get(index)?;
        result.entries.push((name, value));
    }
    Ok(result)
}
