//! Relational persistence components backed by SQLite.
//! Entity-specific persistences build on the generic engines exported here.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod refs;

pub use config::PersistenceConfig;
pub use db::{ConnectionManager, SqliteClient, SqliteConnection};
pub use error::{codes, PersistenceError, PersistenceResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{is_empty, DataPage, IdKey, Identifiable, PagingParams, Row};
pub use persistence::{
    IdentifiableJsonSqlitePersistence, IdentifiableSqlitePersistence, IndexOptions,
    JsonDocumentConverter, RowConverter, SchemaBuilder, SerdeRowConverter, SqlitePersistence,
};
pub use refs::{Descriptor, References};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
