//! Pooled client handle shared by persistence components.
//!
//! # Responsibility
//! - Hand out one locked connection per logical operation (`Session`).
//! - Count executed statements for diagnostics.
//!
//! # Invariants
//! - Statements issued on one `Session` run back-to-back on the same
//!   physical connection; no other caller interleaves on it.
//! - Once closed, the client refuses new sessions with `NO_CONNECTION`.

use crate::error::{codes, PersistenceError, PersistenceResult};
use crate::model::row::{read_row, Row};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Cheaply clonable handle to a pool of SQLite connections.
#[derive(Clone)]
pub struct SqliteClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    closed: AtomicBool,
    statements: AtomicU64,
}

impl SqliteClient {
    pub(crate) fn new(connections: Vec<Connection>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connections: connections.into_iter().map(Mutex::new).collect(),
                next: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                statements: AtomicU64::new(0),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Total statements executed through this client since it was opened.
    pub fn executed_statements(&self) -> u64 {
        self.inner.statements.load(Ordering::Relaxed)
    }

    /// Checks out one connection for the duration of the returned session.
    pub fn session(&self) -> PersistenceResult<Session<'_>> {
        if self.is_closed() {
            return Err(PersistenceError::invalid_state(
                None,
                codes::NO_CONNECTION,
                "SQLite client is closed",
            ));
        }
        let conn = self.inner.acquire().ok_or_else(|| {
            PersistenceError::invalid_state(None, codes::NO_CONNECTION, "SQLite pool is empty")
        })?;
        Ok(Session {
            conn,
            statements: &self.inner.statements,
        })
    }

    /// Marks the client closed and returns the physical connections when this
    /// was the last handle.
    pub(crate) fn shutdown(self) -> Option<Vec<Connection>> {
        self.inner.closed.store(true, Ordering::Release);
        let inner = Arc::try_unwrap(self.inner).ok()?;
        Some(
            inner
                .connections
                .into_iter()
                .map(|slot| slot.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
                .collect(),
        )
    }
}

impl ClientInner {
    /// Prefers an idle connection starting from a rotating offset, then waits.
    fn acquire(&self) -> Option<MutexGuard<'_, Connection>> {
        let len = self.connections.len();
        if len == 0 {
            return None;
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;
        for slot in self.connections.iter().cycle().skip(start).take(len) {
            match slot.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => continue,
            }
        }

        let slot = self.connections.iter().cycle().nth(start)?;
        Some(slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// One checked-out connection.
pub struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
    statements: &'a AtomicU64,
}

impl Session<'_> {
    /// Runs a statement and returns the number of affected rows.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> rusqlite::Result<usize> {
        self.count();
        self.conn.execute(sql, params_from_iter(params.iter()))
    }

    /// Runs a query and reads every result row.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
        self.count();
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_row(row)?);
        }
        Ok(result)
    }

    /// Runs a query and reads the first row, if any.
    pub fn query_first(&mut self, sql: &str, params: &[Value]) -> rusqlite::Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Runs a single-value integer query such as `COUNT(*)`.
    pub fn query_count(&mut self, sql: &str, params: &[Value]) -> rusqlite::Result<u64> {
        self.count();
        let count: i64 = self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Runs one or more parameterless statements, e.g. DDL.
    pub fn execute_batch(&mut self, sql: &str) -> rusqlite::Result<()> {
        self.count();
        self.conn.execute_batch(sql)
    }

    fn count(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteClient;
    use crate::error::codes;
    use rusqlite::types::Value;
    use rusqlite::Connection;

    fn memory_client() -> SqliteClient {
        SqliteClient::new(vec![Connection::open_in_memory().unwrap()])
    }

    #[test]
    fn session_runs_statements_and_counts_them() {
        let client = memory_client();
        let mut session = client.session().unwrap();
        session
            .execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)")
            .unwrap();
        let inserted = session
            .execute(
                "INSERT INTO t (id, n) VALUES (?, ?)",
                &[Value::Text("a".to_string()), Value::Integer(3)],
            )
            .unwrap();
        let rows = session.query("SELECT * FROM t", &[]).unwrap();
        let count = session.query_count("SELECT COUNT(*) FROM t", &[]).unwrap();
        drop(session);

        assert_eq!(inserted, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_integer("n"), Some(3));
        assert_eq!(count, 1);
        assert_eq!(client.executed_statements(), 4);
    }

    #[test]
    fn shutdown_of_last_handle_returns_connections() {
        let client = memory_client();
        let other = client.clone();

        assert!(client.shutdown().is_none());
        assert!(other.is_closed());
        let err = other.session().err().unwrap();
        assert_eq!(err.code(), Some(codes::NO_CONNECTION));
        assert_eq!(other.shutdown().map(|conns| conns.len()), Some(1));
    }
}
