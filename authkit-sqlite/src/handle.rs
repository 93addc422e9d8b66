//! SQLite implementation of the guard's database handle.

use std::path::Path;
use std::sync::Arc;

use authkit_guard::{DatabaseError, DatabaseHandle, DiagnosticListener, SqlDialect};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, error};

use crate::error::{SqliteError, SqliteResult};

/// Logs failed statements through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl DiagnosticListener for TracingListener {
    fn on_error(&self, sql: &str, message: &str) {
        error!(sql = %sql, error = %message, "SQLite statement failed");
    }
}

/// A SQLite connection with attachable diagnostic listeners.
///
/// Listeners are notified of every failed statement, including the
/// "no such table" errors raised by [`DatabaseHandle::table_exists`].
pub struct SqliteHandle {
    conn: Mutex<Connection>,
    listeners: Mutex<Vec<Arc<dyn DiagnosticListener>>>,
}

impl SqliteHandle {
    /// Open a database file.
    pub fn open(path: impl AsRef<Path>) -> SqliteResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| SqliteError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened SQLite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> SqliteResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Attach a listener, builder style.
    pub fn with_listener(self, listener: Arc<dyn DiagnosticListener>) -> Self {
        self.listeners.lock().push(listener);
        self
    }

    /// Attach the `tracing` listener, builder style.
    pub fn with_tracing(self) -> Self {
        self.with_listener(Arc::new(TracingListener))
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Run a closure with the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock())
    }

    fn table_info(&self, sql: &str) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn notify(&self, sql: &str, message: &str) {
        for listener in self.listeners.lock().iter() {
            listener.on_error(sql, message);
        }
    }

    fn fail(&self, sql: &str, err: SqliteError) -> DatabaseError {
        self.notify(sql, &err.to_string());
        err.into_database_error(sql)
    }
}

impl DatabaseHandle for SqliteHandle {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn table_exists(&self, table: &str) -> Result<bool, DatabaseError> {
        let sql = format!("SELECT 1 FROM {} LIMIT 0", SqlDialect::Sqlite.quote(table));
        let prepared = self.conn.lock().prepare(&sql).map(|_| ()).map_err(SqliteError::from);

        match prepared {
            Ok(()) => Ok(true),
            Err(e) if e.is_missing_table() => {
                self.notify(&sql, &e.to_string());
                Ok(false)
            }
            Err(e) => Err(self.fail(&sql, e)),
        }
    }

    fn columns(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let sql = format!("PRAGMA table_info({})", SqlDialect::Sqlite.quote(table));
        let result = self.table_info(&sql);

        result.map_err(|e| self.fail(&sql, e))
    }

    fn execute(&self, sql: &str) -> Result<(), DatabaseError> {
        debug!(sql = %sql, "Executing statement");
        let result = self.conn.lock().execute_batch(sql).map_err(SqliteError::from);
        result.map_err(|e| self.fail(sql, e))
    }

    fn detach_listeners(&self) -> Vec<Arc<dyn DiagnosticListener>> {
        std::mem::take(&mut *self.listeners.lock())
    }

    fn attach_listeners(&self, listeners: Vec<Arc<dyn DiagnosticListener>>) {
        self.listeners.lock().extend(listeners);
    }
}
