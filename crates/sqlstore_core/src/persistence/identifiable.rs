//! Id-keyed operations on top of the base engine.
//!
//! # Responsibility
//! - Read, write and delete items addressed by their `id` column.
//! - Generate ids on create/set when enabled.
//!
//! # Invariants
//! - The key column is always named `id`.
//! - Write-then-read operations run both statements on one session.
//! - Empty ids, empty id lists and empty update payloads never reach
//!   the database.

use super::convert::RowConverter;
use super::schema::SchemaDefinition;
use super::sql_builder::{
    generate_columns, generate_parameters, generate_set_parameters, generate_values,
};
use super::sqlite_persistence::SqlitePersistence;
use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{is_empty, IdKey, Identifiable, Row};
use log::trace;
use rusqlite::types::Value;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Persistence for items of type `T` keyed by `K`.
///
/// Derefs to [`SqlitePersistence`] for lifecycle and filter operations.
pub struct IdentifiableSqlitePersistence<T, K> {
    base: SqlitePersistence<T>,
    auto_generate_id: bool,
    _key: PhantomData<fn() -> K>,
}

impl<T, K> IdentifiableSqlitePersistence<T, K>
where
    T: Identifiable<K> + Clone + 'static,
    K: IdKey,
{
    /// Fails when `table_name` is blank: id operations need a concrete table.
    pub fn new(
        table_name: &str,
        converter: impl RowConverter<T> + 'static,
    ) -> PersistenceResult<Self> {
        Self::with_schema_name(table_name, None, converter)
    }

    pub fn with_schema_name(
        table_name: &str,
        schema_name: Option<&str>,
        converter: impl RowConverter<T> + 'static,
    ) -> PersistenceResult<Self> {
        if table_name.trim().is_empty() {
            return Err(PersistenceError::configuration("table name cannot be empty"));
        }
        Ok(Self {
            base: SqlitePersistence::new(Some(table_name), schema_name, converter),
            auto_generate_id: true,
            _key: PhantomData,
        })
    }

    pub fn with_schema_definition(mut self, definition: impl SchemaDefinition + 'static) -> Self {
        self.base = self.base.with_schema_definition(definition);
        self
    }

    /// Controls whether `create` and `set` fill in missing ids.
    pub fn with_auto_generate_id(mut self, enabled: bool) -> Self {
        self.auto_generate_id = enabled;
        self
    }

    pub fn auto_generate_id(&self) -> bool {
        self.auto_generate_id
    }

    pub fn base(&self) -> &SqlitePersistence<T> {
        &self.base
    }

    /// Returns `item` with a fresh id when it has none and generation is on.
    fn with_generated_id<'a>(&self, item: &'a T) -> Cow<'a, T> {
        if self.auto_generate_id && item.id().map_or(true, |id| is_empty(id)) {
            let mut copy = item.clone();
            copy.set_id(K::generate());
            Cow::Owned(copy)
        } else {
            Cow::Borrowed(item)
        }
    }

    /// Items whose id is in `ids`, in storage order.
    pub fn get_list_by_ids(
        &self,
        correlation_id: Option<&str>,
        ids: &[K],
    ) -> PersistenceResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.base.require_table()?;
        let client = self.base.client()?;

        let query = format!(
            "SELECT * FROM {table} WHERE id IN ({})",
            generate_parameters(ids.len())
        );
        let rows = client.session()?.query(&query, &key_values(ids))?;
        trace!(
            "event=items_by_ids module=persistence correlation_id={} table={} requested={} found={}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            ids.len(),
            rows.len()
        );
        self.base.to_public_all(rows)
    }

    pub fn get_one_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> PersistenceResult<Option<T>> {
        if is_empty(id) {
            return Ok(None);
        }
        let table = self.base.require_table()?;
        let client = self.base.client()?;

        let row = client
            .session()?
            .query_first(&format!("SELECT * FROM {table} WHERE id=?"), &[id.clone().into()])?;
        trace!(
            "event=item_by_id module=persistence correlation_id={} table={} id={:?} found={}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            id,
            row.is_some()
        );
        self.convert_optional(row)
    }

    /// Inserts `item`, generating its id first when missing.
    ///
    /// The caller's value is never modified; the stored copy is returned.
    pub fn create(&self, correlation_id: Option<&str>, item: &T) -> PersistenceResult<T> {
        let item = self.with_generated_id(item);
        self.base.create(correlation_id, &*item)
    }

    /// Inserts `item` or overwrites the row that conflicts with it.
    pub fn set(&self, correlation_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let item = self.with_generated_id(item);
        let table = self.base.require_table()?;
        let client = self.base.client()?;
        let row = self.base.converter().from_public(&*item)?;

        let query = format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT DO UPDATE SET {}",
            generate_columns(row.columns()),
            generate_parameters(row.len()),
            generate_set_parameters(row.columns())
        );
        let mut values = generate_values(&row);
        values.extend(generate_values(&row));
        let id = item_key(&*item);

        let mut session = client.session()?;
        session.execute(&query, &values)?;
        let stored = session.query_first(&format!("SELECT * FROM {table} WHERE id=?"), &[id])?;
        drop(session);

        trace!(
            "event=item_set module=persistence correlation_id={} table={} id={:?}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            item.id()
        );
        self.convert_optional(stored)
    }

    /// Replaces every column of an existing row; `None` when no row matched.
    pub fn update(&self, correlation_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let Some(id) = item.id().filter(|id| !is_empty(*id)) else {
            return Ok(None);
        };
        let row = self.base.converter().from_public(item)?;
        self.update_row(correlation_id, id, &row)
    }

    /// Updates only the given columns of the row with `id`.
    pub fn update_partially(
        &self,
        correlation_id: Option<&str>,
        id: &K,
        fields: &Row,
    ) -> PersistenceResult<Option<T>> {
        if is_empty(id) || is_empty(fields) {
            return Ok(None);
        }
        let row = self.base.converter().from_public_partial(fields.clone())?;
        self.update_row(correlation_id, id, &row)
    }

    fn update_row(
        &self,
        correlation_id: Option<&str>,
        id: &K,
        row: &Row,
    ) -> PersistenceResult<Option<T>> {
        let table = self.base.require_table()?;
        let client = self.base.client()?;

        let query = format!(
            "UPDATE {table} SET {} WHERE id=?",
            generate_set_parameters(row.columns())
        );
        let mut values = generate_values(row);
        values.push(id.clone().into());

        let mut session = client.session()?;
        session.execute(&query, &values)?;
        let stored = session.query_first(
            &format!("SELECT * FROM {table} WHERE id=?"),
            &[id.clone().into()],
        )?;
        drop(session);

        trace!(
            "event=item_updated module=persistence correlation_id={} table={} id={:?} found={}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            id,
            stored.is_some()
        );
        self.convert_optional(stored)
    }

    /// Deletes the row with `id` and returns what it held.
    pub fn delete_by_id(&self, correlation_id: Option<&str>, id: &K) -> PersistenceResult<Option<T>> {
        if is_empty(id) {
            return Ok(None);
        }
        let table = self.base.require_table()?;
        let client = self.base.client()?;
        let key: Value = id.clone().into();

        let mut session = client.session()?;
        let removed = session.query_first(
            &format!("SELECT * FROM {table} WHERE id=?"),
            std::slice::from_ref(&key),
        )?;
        session.execute(&format!("DELETE FROM {table} WHERE id=?"), &[key])?;
        drop(session);

        trace!(
            "event=item_deleted module=persistence correlation_id={} table={} id={:?} found={}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            id,
            removed.is_some()
        );
        self.convert_optional(removed)
    }

    pub fn delete_by_ids(&self, correlation_id: Option<&str>, ids: &[K]) -> PersistenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = self.base.require_table()?;
        let client = self.base.client()?;

        let query = format!(
            "DELETE FROM {table} WHERE id IN ({})",
            generate_parameters(ids.len())
        );
        let deleted = client.session()?.execute(&query, &key_values(ids))?;
        trace!(
            "event=items_deleted module=persistence correlation_id={} table={} count={}",
            correlation_id.unwrap_or("-"),
            self.base.table_name().unwrap_or("-"),
            deleted
        );
        Ok(())
    }

    fn convert_optional(&self, row: Option<Row>) -> PersistenceResult<Option<T>> {
        row.map(|row| self.base.converter().to_public(row))
            .transpose()
    }
}

impl<T, K> Deref for IdentifiableSqlitePersistence<T, K> {
    type Target = SqlitePersistence<T>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<T, K> DerefMut for IdentifiableSqlitePersistence<T, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

fn key_values<K: IdKey>(ids: &[K]) -> Vec<Value> {
    ids.iter().cloned().map(Into::into).collect()
}

fn item_key<T: Identifiable<K>, K: IdKey>(item: &T) -> Value {
    item.id().cloned().map_or(Value::Null, Into::into)
}

#[cfg(test)]
mod tests {
    use super::IdentifiableSqlitePersistence;
    use crate::error::PersistenceError;
    use crate::model::{Identifiable, Row};
    use crate::persistence::convert::IdentityConverter;
    use crate::persistence::schema::SchemaBuilder;
    use rusqlite::types::Value;

    fn opened() -> IdentifiableSqlitePersistence<Row, Value> {
        let persistence = IdentifiableSqlitePersistence::new("rows", IdentityConverter)
            .unwrap()
            .with_schema_definition(|schema: &mut SchemaBuilder| {
                schema.ensure_schema("CREATE TABLE \"rows\" (id TEXT PRIMARY KEY, label TEXT)");
            });
        persistence.open(None).unwrap();
        persistence
    }

    #[test]
    fn blank_table_name_is_rejected() {
        let err = IdentifiableSqlitePersistence::<Row, Value>::new(" ", IdentityConverter)
            .err()
            .unwrap();
        assert!(matches!(err, PersistenceError::Configuration { .. }));
    }

    #[test]
    fn create_generates_id_without_touching_input() {
        let persistence = opened();
        let input = Row::new().with("label", "first".to_string());

        let created = persistence.create(None, &input).unwrap();
        assert!(input.id().is_none());
        let id = created.id().cloned().unwrap();
        assert!(matches!(&id, Value::Text(text) if text.len() == 32));

        let loaded = persistence.get_one_by_id(None, &id).unwrap().unwrap();
        assert_eq!(loaded.get_text("label"), Some("first"));
    }

    #[test]
    fn generation_can_be_disabled() {
        let persistence = opened().with_auto_generate_id(false);
        let row = Row::new().with("id", "fixed".to_string()).with("label", "x".to_string());
        let created = persistence.create(None, &row).unwrap();
        assert_eq!(created, row);
        assert!(!persistence.auto_generate_id());
    }

    #[test]
    fn null_id_short_circuits_lookups() {
        let persistence = opened();
        assert!(persistence.get_one_by_id(None, &Value::Null).unwrap().is_none());
        assert!(persistence.delete_by_id(None, &Value::Null).unwrap().is_none());
        assert!(persistence
            .update_partially(None, &Value::Text("x".to_string()), &Row::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn set_inserts_then_overwrites() {
        let persistence = opened();
        let id = Value::Text("r1".to_string());
        let row = Row::new().with("id", id.clone()).with("label", "one".to_string());

        let inserted = persistence.set(None, &row).unwrap().unwrap();
        assert_eq!(inserted.get_text("label"), Some("one"));

        let changed = row.clone().with("label", "two".to_string());
        let overwritten = persistence.set(None, &changed).unwrap().unwrap();
        assert_eq!(overwritten.get_text("label"), Some("two"));
        assert_eq!(persistence.get_count_by_filter(None, None).unwrap(), 1);
    }
}
