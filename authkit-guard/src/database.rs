//! The database handle consumed by the guard.
//!
//! The guard needs very little from a database: table existence, column
//! listing, DDL execution, and a way to temporarily detach the diagnostic
//! listeners a host attached to the handle (query loggers and the like).

use std::fmt;
use std::sync::Arc;

use crate::error::DatabaseError;

/// SQL dialect used when rendering identifiers in generated DDL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// PostgreSQL.
    #[default]
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl SqlDialect {
    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Dialect name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A diagnostic listener attached to a database handle.
///
/// Handles notify their listeners when a statement fails.
pub trait DiagnosticListener: Send + Sync {
    /// Called with the failing statement and the driver message.
    fn on_error(&self, sql: &str, message: &str);
}

/// A live database connection as seen by the guard.
pub trait DatabaseHandle: Send + Sync {
    /// Dialect of the underlying database.
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    /// Check whether a table exists.
    fn table_exists(&self, table: &str) -> Result<bool, DatabaseError>;

    /// List a table's column names.
    fn columns(&self, table: &str) -> Result<Vec<String>, DatabaseError>;

    /// Execute a single DDL statement.
    fn execute(&self, sql: &str) -> Result<(), DatabaseError>;

    /// Detach and return every attached diagnostic listener.
    fn detach_listeners(&self) -> Vec<Arc<dyn DiagnosticListener>>;

    /// Re-attach previously detached listeners.
    fn attach_listeners(&self, listeners: Vec<Arc<dyn DiagnosticListener>>);
}

/// Keeps a handle's listeners detached for as long as it lives.
///
/// Listeners are re-attached on drop, including during unwinding.
pub struct DetachedListeners<'a> {
    db: &'a dyn DatabaseHandle,
    listeners: Option<Vec<Arc<dyn DiagnosticListener>>>,
}

impl<'a> DetachedListeners<'a> {
    /// Detach the handle's listeners.
    pub fn new(db: &'a dyn DatabaseHandle) -> Self {
        let listeners = db.detach_listeners();
        Self {
            db,
            listeners: Some(listeners),
        }
    }

    /// Number of listeners held back.
    pub fn count(&self) -> usize {
        self.listeners.as_ref().map_or(0, Vec::len)
    }
}

impl Drop for DetachedListeners<'_> {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.take() {
            self.db.attach_listeners(listeners);
        }
    }
}
