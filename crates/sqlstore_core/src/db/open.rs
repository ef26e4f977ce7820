//! Physical SQLite connection bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for a pool.
//! - Configure connection pragmas and busy timeout.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - In-memory targets always yield a single connection.

use crate::config::IN_MEMORY_URI;
use log::{debug, error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

/// Settings for one pool of physical connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenSettings {
    pub uri: String,
    pub pool_size: usize,
    pub busy_timeout: Duration,
    pub trace_sql: bool,
}

impl OpenSettings {
    pub fn is_memory(&self) -> bool {
        is_memory_uri(&self.uri)
    }

    /// Pool size after clamping; in-memory databases are not shared between connections.
    pub fn effective_pool_size(&self) -> usize {
        if self.is_memory() {
            1
        } else {
            self.pool_size.max(1)
        }
    }
}

pub(crate) fn is_memory_uri(uri: &str) -> bool {
    uri == IN_MEMORY_URI || uri.contains("mode=memory")
}

/// Opens every connection of a pool, failing on the first error.
pub(crate) fn open_pool(settings: &OpenSettings) -> rusqlite::Result<Vec<Connection>> {
    let started_at = Instant::now();
    let mode = if settings.is_memory() { "memory" } else { "file" };
    let size = settings.effective_pool_size();
    info!("event=db_open module=db status=start mode={mode} pool_size={size}");

    let mut connections = Vec::with_capacity(size);
    for _ in 0..size {
        match open_one(settings) {
            Ok(conn) => connections.push(conn),
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        }
    }

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(connections)
}

fn open_one(settings: &OpenSettings) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(&settings.uri)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(settings.busy_timeout)?;
    if settings.trace_sql {
        conn.trace(Some(trace_statement));
    }
    Ok(conn)
}

fn trace_statement(sql: &str) {
    debug!("event=sql_trace module=db sql={}", sql.replace(['\n', '\r'], " "));
}
