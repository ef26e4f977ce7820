//! SQLite connection management.
//!
//! # Responsibility
//! - Define the boundary persistence components use to reach the store.
//! - Open pooled SQLite connections and hand out sessions.
//!
//! # Invariants
//! - Persistence components never touch physical connections directly;
//!   they go through `ConnectionManager` and `SqliteClient`.

mod client;
mod connection;
mod open;

pub use client::{Session, SqliteClient};
pub use connection::SqliteConnection;

use crate::error::PersistenceResult;

/// Lifecycle boundary between persistence components and the store.
pub trait ConnectionManager: Send + Sync {
    fn open(&self, correlation_id: Option<&str>) -> PersistenceResult<()>;
    fn close(&self, correlation_id: Option<&str>) -> PersistenceResult<()>;
    fn is_open(&self) -> bool;
    /// Pooled client handle; `None` until opened.
    fn connection(&self) -> Option<SqliteClient>;
    fn database_name(&self) -> Option<String>;
}
