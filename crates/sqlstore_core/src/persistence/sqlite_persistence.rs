//! Base persistence engine for one SQLite table.
//!
//! # Responsibility
//! - Own the lifecycle: configure, resolve references, open, close, clear.
//! - Bootstrap the table schema on first open.
//! - Run filtered, sorted and paged queries and convert rows to items.
//!
//! # Invariants
//! - Filters, sort and select fragments are caller-rendered SQL and are
//!   inserted verbatim; values always travel as bound parameters.
//! - A COUNT query is issued only when `PagingParams::total` is set.
//! - A connection the engine created itself is opened and closed by the
//!   engine; a shared one is left open for other components.

use super::convert::{IdentityConverter, RowConverter};
use super::schema::{NoSchema, SchemaBuilder, SchemaDefinition};
use super::sql_builder::{
    generate_columns, generate_parameters, generate_values, qualified_table_name, quote_identifier,
    where_clause,
};
use crate::config::{PersistenceConfig, DEFAULT_MAX_PAGE_SIZE};
use crate::db::{ConnectionManager, Session, SqliteClient, SqliteConnection};
use crate::error::{codes, PersistenceError, PersistenceResult};
use crate::model::{DataPage, PagingParams, Row};
use crate::refs::{parse_locator, References};
use log::{debug, error, trace};
use rand::Rng;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct EngineState {
    connection: Option<Arc<dyn ConnectionManager>>,
    owns_connection: bool,
    opened: bool,
    client: Option<SqliteClient>,
    database_name: Option<String>,
    schema: SchemaBuilder,
}

/// Table-bound persistence component storing items of type `T`.
pub struct SqlitePersistence<T> {
    config: PersistenceConfig,
    table_name: Option<String>,
    schema_name: Option<String>,
    max_page_size: u64,
    converter: Arc<dyn RowConverter<T>>,
    schema_definition: Arc<dyn SchemaDefinition>,
    state: RwLock<EngineState>,
}

impl SqlitePersistence<Row> {
    /// Engine over raw rows with identity conversion.
    pub fn for_rows(table_name: Option<&str>, schema_name: Option<&str>) -> Self {
        Self::new(table_name, schema_name, IdentityConverter)
    }
}

impl<T: Clone + 'static> SqlitePersistence<T> {
    pub fn new(
        table_name: Option<&str>,
        schema_name: Option<&str>,
        converter: impl RowConverter<T> + 'static,
    ) -> Self {
        Self {
            config: PersistenceConfig::persistence_defaults(),
            table_name: table_name.map(str::to_string),
            schema_name: schema_name.map(str::to_string),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            converter: Arc::new(converter),
            schema_definition: Arc::new(NoSchema),
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Installs the hook that declares this table's DDL.
    pub fn with_schema_definition(mut self, definition: impl SchemaDefinition + 'static) -> Self {
        self.schema_definition = Arc::new(definition);
        self
    }

    /// Applies configuration; supplied values win over engine defaults.
    pub fn configure(&mut self, config: &PersistenceConfig) -> PersistenceResult<()> {
        let config = config.with_defaults(&PersistenceConfig::persistence_defaults());
        if let Some(locator) = config.dependencies.connection.as_deref() {
            parse_locator(locator)?;
        }

        if let Some(table) = non_blank(config.table_name()) {
            self.table_name = Some(table.to_string());
        }
        if let Some(schema) = non_blank(config.schema.as_deref()) {
            self.schema_name = Some(schema.to_string());
        }
        self.max_page_size = config.options.max_page_size.unwrap_or(self.max_page_size);
        self.config = config;
        Ok(())
    }

    /// Resolves a shared connection, or creates a private one when none matches.
    pub fn set_references(&mut self, references: &References) -> PersistenceResult<()> {
        let shared = match self.config.dependencies.connection.as_deref() {
            Some(locator) => references.get_one_optional(&parse_locator(locator)?),
            None => None,
        };

        let mut state = self.write_state();
        match shared {
            Some(connection) => {
                state.connection = Some(connection);
                state.owns_connection = false;
            }
            None => {
                state.connection = Some(self.create_connection());
                state.owns_connection = true;
            }
        }
        Ok(())
    }

    /// Drops the connection reference.
    pub fn unset_references(&mut self) {
        self.write_state().connection = None;
    }

    fn create_connection(&self) -> Arc<dyn ConnectionManager> {
        Arc::new(SqliteConnection::new(&self.config))
    }

    pub fn is_open(&self) -> bool {
        self.read_state().opened
    }

    /// True when the engine created (and therefore manages) its connection.
    pub fn owns_connection(&self) -> bool {
        self.read_state().owns_connection
    }

    /// Opens the connection when owned, caches the client and ensures the schema.
    pub fn open(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let mut state = self.write_state();
        if state.opened {
            return Ok(());
        }

        let connection = match state.connection.clone() {
            Some(connection) => connection,
            None => {
                let connection = self.create_connection();
                state.connection = Some(Arc::clone(&connection));
                state.owns_connection = true;
                connection
            }
        };

        if state.owns_connection {
            connection.open(correlation_id)?;
        }

        let client = match connection.connection() {
            Some(client) if connection.is_open() => client,
            _ => {
                return Err(PersistenceError::connection(
                    correlation_id,
                    codes::CONNECT_FAILED,
                    "SQLite connection is not opened",
                ))
            }
        };
        state.database_name = connection.database_name();

        let mut schema = SchemaBuilder::new(self.table_name(), self.schema_name());
        self.schema_definition.define_schema(&mut schema);
        state.schema = schema;

        match self.ensure_schema_objects(correlation_id, &client, &state.schema) {
            Ok(()) => {
                state.client = Some(client);
                state.opened = true;
                debug!(
                    "event=persistence_open module=persistence status=ok correlation_id={} database={} table={}",
                    correlation_id.unwrap_or("-"),
                    state.database_name.as_deref().unwrap_or("-"),
                    self.table_name().unwrap_or("-")
                );
                Ok(())
            }
            Err(err) => {
                state.client = None;
                Err(PersistenceError::connection(
                    correlation_id,
                    codes::CONNECT_FAILED,
                    "connection to SQLite failed",
                )
                .with_cause(err))
            }
        }
    }

    /// Releases the cached client and closes the connection when owned.
    pub fn close(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let mut state = self.write_state();
        if !state.opened {
            return Ok(());
        }

        let Some(connection) = state.connection.clone() else {
            return Err(PersistenceError::invalid_state(
                correlation_id,
                codes::NO_CONNECTION,
                "SQLite connection is missing",
            ));
        };

        // The pool can only shut down once this handle is gone.
        state.client = None;
        if state.owns_connection {
            connection.close(correlation_id)?;
            state.database_name = None;
        }

        state.opened = false;
        debug!(
            "event=persistence_close module=persistence status=ok correlation_id={} table={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-")
        );
        Ok(())
    }

    /// Deletes every row of the table.
    pub fn clear(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let table = self.require_table()?;
        let client = self.client()?;
        client
            .session()?
            .execute(&format!("DELETE FROM {table}"), &[])?;
        trace!(
            "event=table_cleared module=persistence correlation_id={} table={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-")
        );
        Ok(())
    }

    /// Replays the declared schema statements when the table is missing.
    pub fn create_schema(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let client = self.client()?;
        let schema = self.read_state().schema.clone();
        self.ensure_schema_objects(correlation_id, &client, &schema)
    }

    fn ensure_schema_objects(
        &self,
        correlation_id: Option<&str>,
        client: &SqliteClient,
        schema: &SchemaBuilder,
    ) -> PersistenceResult<()> {
        if schema.is_empty() {
            return Ok(());
        }

        let mut session = client.session()?;
        if self.table_exists(&mut session)? {
            return Ok(());
        }

        debug!(
            "event=schema_create module=persistence status=start correlation_id={} table={} statements={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            schema.statements().len()
        );

        for statement in schema.statements() {
            if let Err(err) = session.execute_batch(statement) {
                error!(
                    "event=schema_create module=persistence status=error correlation_id={} table={} error={}",
                    correlation_id.unwrap_or("-"),
                    self.table_name().unwrap_or("-"),
                    err
                );
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn table_exists(&self, session: &mut Session<'_>) -> PersistenceResult<bool> {
        let table = self
            .table_name()
            .ok_or_else(|| PersistenceError::configuration("table name is not defined"))?;
        let master = match self.schema_name() {
            Some(schema) => format!("{}.sqlite_master", quote_identifier(schema)),
            None => "sqlite_master".to_string(),
        };
        let count = session.query_count(
            &format!("SELECT COUNT(*) FROM {master} WHERE type='table' AND name=?"),
            &[table.to_string().into()],
        )?;
        Ok(count > 0)
    }

    /// Statements declared on the last open.
    pub fn schema_statements(&self) -> Vec<String> {
        self.read_state().schema.statements().to_vec()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn database_name(&self) -> Option<String> {
        self.read_state().database_name.clone()
    }

    /// Schema-qualified, quoted table name; `None` before a table is bound.
    pub fn quoted_table_name(&self) -> Option<String> {
        qualified_table_name(self.table_name(), self.schema_name())
    }

    pub(crate) fn require_table(&self) -> PersistenceResult<String> {
        self.quoted_table_name()
            .ok_or_else(|| PersistenceError::configuration("table name is not defined"))
    }

    /// Cached client of an opened engine.
    pub fn client(&self) -> PersistenceResult<SqliteClient> {
        let state = self.read_state();
        match (&state.client, state.opened) {
            (Some(client), true) => Ok(client.clone()),
            _ => Err(PersistenceError::invalid_state(
                None,
                codes::NOT_OPENED,
                "persistence component is not opened",
            )),
        }
    }

    pub fn converter(&self) -> &dyn RowConverter<T> {
        self.converter.as_ref()
    }

    pub(crate) fn to_public_all(&self, rows: Vec<Row>) -> PersistenceResult<Vec<T>> {
        rows.into_iter()
            .map(|row| self.converter.to_public(row))
            .collect()
    }

    /// Page of items matching `filter`, with a total when `paging.total` is set.
    pub fn get_page_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&str>,
        paging: Option<&PagingParams>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<DataPage<T>> {
        let table = self.require_table()?;
        let client = self.client()?;
        let paging = paging.copied().unwrap_or_default();
        let filter_clause = where_clause(filter);

        let mut query = format!("SELECT {} FROM {table}{filter_clause}", select_list(select));
        if let Some(sort) = non_blank(sort) {
            query.push_str(&format!(" ORDER BY {sort}"));
        }
        query.push_str(&format!(
            " LIMIT {}",
            sql_integer(paging.take_or(self.max_page_size))
        ));
        if let Some(skip) = paging.skip {
            query.push_str(&format!(" OFFSET {}", sql_integer(skip)));
        }

        let mut session = client.session()?;
        let rows = session.query(&query, &[])?;
        trace!(
            "event=page_retrieved module=persistence correlation_id={} table={} count={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            rows.len()
        );

        let total = if paging.total {
            Some(session.query_count(
                &format!("SELECT COUNT(*) AS count FROM {table}{filter_clause}"),
                &[],
            )?)
        } else {
            None
        };
        drop(session);

        Ok(DataPage::new(self.to_public_all(rows)?, total))
    }

    /// Number of rows matching `filter`.
    pub fn get_count_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&str>,
    ) -> PersistenceResult<u64> {
        let table = self.require_table()?;
        let client = self.client()?;
        let count = client.session()?.query_count(
            &format!("SELECT COUNT(*) AS count FROM {table}{}", where_clause(filter)),
            &[],
        )?;
        trace!(
            "event=items_counted module=persistence correlation_id={} table={} count={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            count
        );
        Ok(count)
    }

    /// Every item matching `filter`, unpaged.
    pub fn get_list_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&str>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<Vec<T>> {
        let table = self.require_table()?;
        let client = self.client()?;

        let mut query = format!(
            "SELECT {} FROM {table}{}",
            select_list(select),
            where_clause(filter)
        );
        if let Some(sort) = non_blank(sort) {
            query.push_str(&format!(" ORDER BY {sort}"));
        }

        let rows = client.session()?.query(&query, &[])?;
        trace!(
            "event=list_retrieved module=persistence correlation_id={} table={} count={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            rows.len()
        );
        self.to_public_all(rows)
    }

    /// One uniformly chosen item matching `filter`.
    ///
    /// Counts first, then reads at a random offset. The two statements are
    /// not isolated from concurrent writers, so a shrinking table can yield
    /// `None` even though matching rows remain.
    pub fn get_one_random(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&str>,
    ) -> PersistenceResult<Option<T>> {
        let table = self.require_table()?;
        let client = self.client()?;
        let filter_clause = where_clause(filter);
        let mut session = client.session()?;

        let count = session.query_count(
            &format!("SELECT COUNT(*) AS count FROM {table}{filter_clause}"),
            &[],
        )?;
        let row = if count == 0 {
            None
        } else {
            let position = rand::thread_rng().gen_range(0..count);
            session.query_first(
                &format!("SELECT * FROM {table}{filter_clause} LIMIT 1 OFFSET {position}"),
                &[],
            )?
        };
        drop(session);

        match row {
            Some(row) => {
                trace!(
                    "event=random_retrieved module=persistence correlation_id={} table={} status=ok",
                    correlation_id.unwrap_or("-"),
                    self.table_name().unwrap_or("-")
                );
                Ok(Some(self.converter.to_public(row)?))
            }
            None => {
                trace!(
                    "event=random_retrieved module=persistence correlation_id={} table={} status=not_found",
                    correlation_id.unwrap_or("-"),
                    self.table_name().unwrap_or("-")
                );
                Ok(None)
            }
        }
    }

    /// Inserts `item` and returns it unchanged.
    pub fn create(&self, correlation_id: Option<&str>, item: &T) -> PersistenceResult<T> {
        let table = self.require_table()?;
        let client = self.client()?;
        let row = self.converter.from_public(item)?;

        let query = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            generate_columns(row.columns()),
            generate_parameters(row.len())
        );
        client.session()?.execute(&query, &generate_values(&row))?;

        trace!(
            "event=item_created module=persistence correlation_id={} table={} id={:?}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            row.get("id")
        );
        Ok(item.clone())
    }

    /// Deletes every row matching `filter`.
    pub fn delete_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Option<&str>,
    ) -> PersistenceResult<()> {
        let table = self.require_table()?;
        let client = self.client()?;
        let deleted = client
            .session()?
            .execute(&format!("DELETE FROM {table}{}", where_clause(filter)), &[])?;
        trace!(
            "event=items_deleted module=persistence correlation_id={} table={} count={}",
            correlation_id.unwrap_or("-"),
            self.table_name().unwrap_or("-"),
            deleted
        );
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn non_blank(fragment: Option<&str>) -> Option<&str> {
    fragment.filter(|value| !value.trim().is_empty())
}

/// SQLite integers are signed 64-bit; larger window values saturate.
fn sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn select_list(select: Option<&str>) -> &str {
    non_blank(select).unwrap_or("*")
}
