//! Identifiable persistence storing each item as one JSON document.
//!
//! Rows have two columns, `id` and `data`. Partial updates merge into the
//! stored document with SQLite's `json_patch`.

use super::convert::{JsonDocumentConverter, DATA_COLUMN};
use super::identifiable::IdentifiableSqlitePersistence;
use super::schema::{SchemaBuilder, SchemaDefinition};
use crate::error::PersistenceResult;
use crate::model::{is_empty, IdKey, Identifiable, ID_COLUMN};
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::ops::{Deref, DerefMut};

pub const DEFAULT_ID_TYPE: &str = "VARCHAR(32)";
pub const DEFAULT_DATA_TYPE: &str = "TEXT";

pub struct IdentifiableJsonSqlitePersistence<T, K> {
    inner: IdentifiableSqlitePersistence<T, K>,
}

impl<T, K> IdentifiableJsonSqlitePersistence<T, K>
where
    T: Identifiable<K> + Serialize + DeserializeOwned + Clone + 'static,
    K: IdKey,
{
    pub fn new(table_name: &str) -> PersistenceResult<Self> {
        Self::with_schema_name(table_name, None)
    }

    pub fn with_schema_name(table_name: &str, schema_name: Option<&str>) -> PersistenceResult<Self> {
        Ok(Self {
            inner: IdentifiableSqlitePersistence::with_schema_name(
                table_name,
                schema_name,
                JsonDocumentConverter::new(),
            )?,
        })
    }

    pub fn with_schema_definition(mut self, definition: impl SchemaDefinition + 'static) -> Self {
        self.inner = self.inner.with_schema_definition(definition);
        self
    }

    pub fn with_auto_generate_id(mut self, enabled: bool) -> Self {
        self.inner = self.inner.with_auto_generate_id(enabled);
        self
    }

    /// Merges `fields` into the stored document of `id`.
    ///
    /// Keys set to `null` in `fields` are removed from the document.
    pub fn update_partially(
        &self,
        correlation_id: Option<&str>,
        id: &K,
        fields: &JsonValue,
    ) -> PersistenceResult<Option<T>> {
        if is_empty(id) || is_empty(fields) {
            return Ok(None);
        }
        let table = self.require_table()?;
        let client = self.client()?;

        let mut session = client.session()?;
        session.execute(
            &format!("UPDATE {table} SET {DATA_COLUMN}=json_patch({DATA_COLUMN},?) WHERE id=?"),
            &[fields.to_string().into(), id.clone().into()],
        )?;
        let stored = session.query_first(
            &format!("SELECT * FROM {table} WHERE id=?"),
            &[id.clone().into()],
        )?;
        drop(session);

        trace!(
            "event=document_patched module=persistence correlation_id={} table={} id={:?} found={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            id,
            stored.is_some()
        );
        stored.map(|row| self.converter().to_public(row)).transpose()
    }
}

impl<T, K> IdentifiableJsonSqlitePersistence<T, K> {
    /// Declares the `(id, data)` table.
    ///
    /// Column types default to [`DEFAULT_ID_TYPE`] and [`DEFAULT_DATA_TYPE`].
    pub fn ensure_table(schema: &mut SchemaBuilder, id_type: Option<&str>, data_type: Option<&str>) {
        let table = schema.quoted_table_name().unwrap_or_default();
        schema.ensure_schema(format!(
            "CREATE TABLE {table} ({ID_COLUMN} {} PRIMARY KEY, {DATA_COLUMN} {})",
            id_type.unwrap_or(DEFAULT_ID_TYPE),
            data_type.unwrap_or(DEFAULT_DATA_TYPE)
        ));
    }
}

impl<T, K> Deref for IdentifiableJsonSqlitePersistence<T, K> {
    type Target = IdentifiableSqlitePersistence<T, K>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T, K> DerefMut for IdentifiableJsonSqlitePersistence<T, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
