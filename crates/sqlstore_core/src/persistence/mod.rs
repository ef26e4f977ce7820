//! Table-bound persistence components.
//!
//! # Responsibility
//! - `SqlitePersistence`: lifecycle, schema bootstrap, filter queries.
//! - `IdentifiableSqlitePersistence`: id-keyed CRUD on top of it.
//! - `IdentifiableJsonSqlitePersistence`: id-keyed JSON documents.
//!
//! # See also
//! - `sql_builder` for the SQL text helpers all layers share.

pub mod convert;
pub mod identifiable;
pub mod json;
pub mod schema;
pub mod sql_builder;
pub mod sqlite_persistence;

pub use convert::{
    IdentityConverter, JsonDocumentConverter, RowConverter, SerdeRowConverter, DATA_COLUMN,
};
pub use identifiable::IdentifiableSqlitePersistence;
pub use json::IdentifiableJsonSqlitePersistence;
pub use schema::{IndexOptions, NoSchema, SchemaBuilder, SchemaDefinition};
pub use sqlite_persistence::SqlitePersistence;
