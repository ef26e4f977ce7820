//! Configuration model for persistence components and their connections.
//!
//! # Responsibility
//! - Describe every recognized option as an explicit, immutable struct.
//! - Merge supplied options over defaults without shared mutable state.
//!
//! # Invariants
//! - Supplied values always win; defaults only fill gaps.
//! - `table` wins over the legacy `collection` key.

use crate::error::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONNECTION_DEPENDENCY: &str = "*:connection:sqlite:*:1.0";
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
pub const IN_MEMORY_URI: &str = ":memory:";

/// Options recognized by a persistence component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub table: Option<String>,
    /// Legacy alias of `table`.
    pub collection: Option<String>,
    /// Attached database name used to qualify the table (`main`, `temp`, ...).
    pub schema: Option<String>,
    pub dependencies: DependencyConfig,
    pub connection: ConnectionConfig,
    pub options: PoolOptions,
}

/// Descriptors used to look up shared components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    pub connection: Option<String>,
}

/// Location of the SQLite database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// File path, `file:` URI, or `:memory:`.
    pub uri: Option<String>,
    /// Logical database name reported to components.
    pub database: Option<String>,
}

/// Pool and paging options. Timeouts are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub max_pool_size: Option<usize>,
    pub connect_timeout: Option<u64>,
    pub idle_timeout: Option<u64>,
    pub max_page_size: Option<u64>,
    pub debug: Option<bool>,
}

impl PersistenceConfig {
    /// Defaults applied by persistence components.
    pub fn persistence_defaults() -> Self {
        Self {
            dependencies: DependencyConfig {
                connection: Some(DEFAULT_CONNECTION_DEPENDENCY.to_string()),
            },
            options: PoolOptions {
                max_pool_size: Some(2),
                connect_timeout: Some(5000),
                idle_timeout: None,
                max_page_size: Some(DEFAULT_MAX_PAGE_SIZE),
                debug: Some(false),
            },
            ..Self::default()
        }
    }

    /// Defaults applied by connection managers.
    pub fn connection_defaults() -> Self {
        Self {
            connection: ConnectionConfig {
                uri: Some(IN_MEMORY_URI.to_string()),
                database: None,
            },
            options: PoolOptions {
                max_pool_size: Some(3),
                connect_timeout: Some(5000),
                idle_timeout: Some(10_000),
                max_page_size: None,
                debug: Some(false),
            },
            ..Self::default()
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> PersistenceResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| PersistenceError::configuration(format!("invalid config: {err}")))
    }

    /// Returns a new config where values set on `self` win over `defaults`.
    pub fn with_defaults(&self, defaults: &Self) -> Self {
        Self {
            table: self.table.clone().or_else(|| defaults.table.clone()),
            collection: self.collection.clone().or_else(|| defaults.collection.clone()),
            schema: self.schema.clone().or_else(|| defaults.schema.clone()),
            dependencies: DependencyConfig {
                connection: self
                    .dependencies
                    .connection
                    .clone()
                    .or_else(|| defaults.dependencies.connection.clone()),
            },
            connection: ConnectionConfig {
                uri: self
                    .connection
                    .uri
                    .clone()
                    .or_else(|| defaults.connection.uri.clone()),
                database: self
                    .connection
                    .database
                    .clone()
                    .or_else(|| defaults.connection.database.clone()),
            },
            options: self.options.with_defaults(&defaults.options),
        }
    }

    /// Resolved table name: `table`, then `collection`.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref().or(self.collection.as_deref())
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.connection.uri = Some(uri.into());
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u64) -> Self {
        self.options.max_page_size = Some(max_page_size);
        self
    }
}

impl PoolOptions {
    fn with_defaults(&self, defaults: &Self) -> Self {
        Self {
            max_pool_size: self.max_pool_size.or(defaults.max_pool_size),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            idle_timeout: self.idle_timeout.or(defaults.idle_timeout),
            max_page_size: self.max_page_size.or(defaults.max_page_size),
            debug: self.debug.or(defaults.debug),
        }
    }
}
