//! Connection manager that owns a pooled SQLite client.
//!
//! # Responsibility
//! - Resolve the target database from configuration.
//! - Open and close the pooled client on behalf of persistence components.
//!
//! # Invariants
//! - `open` is idempotent while the client is alive.
//! - `close` releases the pool; clients still held elsewhere become unusable.

use super::client::SqliteClient;
use super::open::{is_memory_uri, open_pool, OpenSettings};
use super::ConnectionManager;
use crate::config::{PersistenceConfig, IN_MEMORY_URI};
use crate::error::{codes, PersistenceError, PersistenceResult};
use log::{debug, error};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MEMORY_DATABASE_NAME: &str = "memory";

/// SQLite connection shared by one or more persistence components.
pub struct SqliteConnection {
    config: PersistenceConfig,
    client: Mutex<Option<SqliteClient>>,
}

impl SqliteConnection {
    /// Creates a connection from `config` merged over connection defaults.
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            config: config.with_defaults(&PersistenceConfig::connection_defaults()),
            client: Mutex::new(None),
        }
    }

    /// In-memory connection with default options.
    pub fn in_memory() -> Self {
        Self::new(&PersistenceConfig::default())
    }

    /// File-backed connection with default options.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        let uri = path.as_ref().to_string_lossy().into_owned();
        Self::new(&PersistenceConfig::default().with_uri(uri))
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    fn uri(&self) -> &str {
        self.config.connection.uri.as_deref().unwrap_or(IN_MEMORY_URI)
    }

    fn settings(&self) -> OpenSettings {
        let options = &self.config.options;
        OpenSettings {
            uri: self.uri().to_string(),
            pool_size: options.max_pool_size.unwrap_or(1),
            busy_timeout: Duration::from_millis(options.connect_timeout.unwrap_or(0)),
            trace_sql: options.debug.unwrap_or(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<SqliteClient>> {
        self.client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConnectionManager for SqliteConnection {
    fn open(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let mut state = self.state();
        if state.is_some() {
            return Ok(());
        }

        let settings = self.settings();
        let connections = open_pool(&settings).map_err(|err| {
            PersistenceError::connection(
                correlation_id,
                codes::CONNECT_FAILED,
                format!("failed to open SQLite database `{}`", settings.uri),
            )
            .with_cause(err)
        })?;

        debug!(
            "event=connection_open module=db status=ok correlation_id={} database={} pool_size={} idle_timeout_ms={}",
            correlation_id.unwrap_or("-"),
            self.database_name().unwrap_or_default(),
            connections.len(),
            self.config.options.idle_timeout.unwrap_or(0)
        );
        *state = Some(SqliteClient::new(connections));
        Ok(())
    }

    fn close(&self, correlation_id: Option<&str>) -> PersistenceResult<()> {
        let Some(client) = self.state().take() else {
            return Ok(());
        };

        // Clients held by other components keep the pool alive until dropped.
        let Some(connections) = client.shutdown() else {
            debug!(
                "event=connection_close module=db status=deferred correlation_id={}",
                correlation_id.unwrap_or("-")
            );
            return Ok(());
        };

        for conn in connections {
            if let Err((_, err)) = conn.close() {
                error!(
                    "event=connection_close module=db status=error correlation_id={} error={}",
                    correlation_id.unwrap_or("-"),
                    err
                );
                return Err(PersistenceError::connection(
                    correlation_id,
                    codes::DISCONNECT_FAILED,
                    "failed to close SQLite connection",
                )
                .with_cause(err));
            }
        }

        debug!(
            "event=connection_close module=db status=ok correlation_id={}",
            correlation_id.unwrap_or("-")
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().is_some()
    }

    fn connection(&self) -> Option<SqliteClient> {
        self.state().clone()
    }

    fn database_name(&self) -> Option<String> {
        if let Some(name) = self.config.connection.database.as_deref() {
            return Some(name.to_string());
        }
        let uri = self.uri();
        if is_memory_uri(uri) {
            return Some(MEMORY_DATABASE_NAME.to_string());
        }
        let path = uri.strip_prefix("file:").unwrap_or(uri);
        let path = path.split('?').next().unwrap_or(path);
        Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteConnection;
    use crate::config::PersistenceConfig;
    use crate::db::ConnectionManager;
    use crate::error::codes;

    #[test]
    fn open_is_idempotent_and_close_releases_client() {
        let connection = SqliteConnection::in_memory();
        connection.open(Some("123")).unwrap();
        let first = connection.connection().unwrap();
        connection.open(Some("123")).unwrap();
        let second = connection.connection().unwrap();
        assert_eq!(first.pool_size(), 1);
        drop(second);

        connection.close(Some("123")).unwrap();
        assert!(!connection.is_open());
        assert!(connection.connection().is_none());
        assert!(first.is_closed());
        assert_eq!(
            first.session().err().map(|err| err.code()),
            Some(Some(codes::NO_CONNECTION))
        );
    }

    #[test]
    fn close_without_open_is_noop() {
        let connection = SqliteConnection::in_memory();
        connection.close(None).unwrap();
        assert!(!connection.is_open());
    }

    #[test]
    fn unreachable_target_fails_with_connect_failed() {
        let dir = tempfile::tempdir().unwrap();
        let connection = SqliteConnection::with_path(dir.path().join("no").join("such.db"));

        let err = connection.open(None).unwrap_err();
        assert_eq!(err.code(), Some(codes::CONNECT_FAILED));
        assert!(!connection.is_open());
    }

    #[test]
    fn database_name_prefers_config_then_file_stem() {
        assert_eq!(
            SqliteConnection::in_memory().database_name().as_deref(),
            Some("memory")
        );
        assert_eq!(
            SqliteConnection::with_path("/var/data/orders.db")
                .database_name()
                .as_deref(),
            Some("orders")
        );

        let mut config = PersistenceConfig::default().with_uri("file:/tmp/app.db?mode=rwc");
        assert_eq!(
            SqliteConnection::new(&config).database_name().as_deref(),
            Some("app")
        );
        config.connection.database = Some("inventory".to_string());
        assert_eq!(
            SqliteConnection::new(&config).database_name().as_deref(),
            Some("inventory")
        );
    }

    #[test]
    fn file_database_uses_configured_pool_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            PersistenceConfig::default().with_uri(dir.path().join("pool.db").to_string_lossy());
        config.options.max_pool_size = Some(2);

        let connection = SqliteConnection::new(&config);
        connection.open(None).unwrap();
        assert_eq!(connection.connection().unwrap().pool_size(), 2);
        connection.close(None).unwrap();
    }
}
