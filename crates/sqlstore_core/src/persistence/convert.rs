//! Conversion strategies between public items and storage rows.
//!
//! # Responsibility
//! - Map caller-facing item types onto flat `Row`s and back.
//!
//! # Invariants
//! - Converters are pure: no I/O, no shared state.
//! - `IdentityConverter` returns rows unchanged.

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{Row, ID_COLUMN};
use rusqlite::types::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};
use std::marker::PhantomData;

pub const DATA_COLUMN: &str = "data";

/// Strategy pair translating `T` to and from storage rows.
pub trait RowConverter<T>: Send + Sync {
    fn to_public(&self, row: Row) -> PersistenceResult<T>;
    fn from_public(&self, item: &T) -> PersistenceResult<Row>;

    /// Converts a partial update; identity unless a converter renames columns.
    fn from_public_partial(&self, fields: Row) -> PersistenceResult<Row> {
        Ok(fields)
    }
}

/// Rows in, rows out.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl RowConverter<Row> for IdentityConverter {
    fn to_public(&self, row: Row) -> PersistenceResult<Row> {
        Ok(row)
    }

    fn from_public(&self, item: &Row) -> PersistenceResult<Row> {
        Ok(item.clone())
    }
}

/// Maps flat serde structs onto one column per field.
///
/// Only scalar fields are accepted. Booleans are rejected on write because
/// SQLite returns them as integers that no longer deserialize into `bool`;
/// flag fields should be integers on the public type. Nested arrays and
/// objects are rejected too.
pub struct SerdeRowConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeRowConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeRowConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> RowConverter<T> for SerdeRowConverter<T> {
    fn to_public(&self, row: Row) -> PersistenceResult<T> {
        let object = row
            .into_iter()
            .map(|(column, value)| (column, sql_to_json(value)))
            .collect::<Map<String, JsonValue>>();
        Ok(serde_json::from_value(JsonValue::Object(object))?)
    }

    fn from_public(&self, item: &T) -> PersistenceResult<Row> {
        let JsonValue::Object(object) = serde_json::to_value(item)? else {
            return Err(PersistenceError::conversion(
                "item must serialize to a JSON object",
            ));
        };
        let mut row = Row::new();
        for (column, value) in object {
            if value.is_boolean() {
                return Err(PersistenceError::conversion(format!(
                    "column `{column}` holds a boolean; store flags as integers"
                )));
            }
            let value = json_to_sql(&column, value)?;
            row.insert(column, value);
        }
        Ok(row)
    }
}

/// Stores the whole item as a JSON document next to its id.
pub struct JsonDocumentConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocumentConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDocumentConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> RowConverter<T> for JsonDocumentConverter<T> {
    fn to_public(&self, row: Row) -> PersistenceResult<T> {
        match row.get(DATA_COLUMN) {
            Some(Value::Text(data)) => Ok(serde_json::from_str(data)?),
            Some(Value::Blob(data)) => Ok(serde_json::from_slice(data)?),
            _ => Err(PersistenceError::conversion(format!(
                "row has no `{DATA_COLUMN}` document"
            ))),
        }
    }

    fn from_public(&self, item: &T) -> PersistenceResult<Row> {
        let document = serde_json::to_value(item)?;
        let id = match document.get(ID_COLUMN) {
            Some(value) => json_to_sql(ID_COLUMN, value.clone())?,
            None => Value::Null,
        };
        Ok(Row::new()
            .with(ID_COLUMN, id)
            .with(DATA_COLUMN, document.to_string()))
    }
}

fn sql_to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(value) => JsonValue::Number(value.into()),
        Value::Real(value) => Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(value) => JsonValue::String(value),
        Value::Blob(bytes) => JsonValue::Array(bytes.into_iter().map(JsonValue::from).collect()),
    }
}

fn json_to_sql(column: &str, value: JsonValue) -> PersistenceResult<Value> {
    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(flag) => Ok(Value::Integer(i64::from(flag))),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => Ok(Value::Integer(integer)),
            None => number.as_f64().map(Value::Real).ok_or_else(|| {
                PersistenceError::conversion(format!("column `{column}` holds an unsupported number"))
            }),
        },
        JsonValue::String(text) => Ok(Value::Text(text)),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(PersistenceError::conversion(format!(
            "column `{column}` holds a nested value"
        ))),
    }
}
