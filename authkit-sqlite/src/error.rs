//! Error types for the SQLite handle.

use std::path::PathBuf;

use authkit_guard::DatabaseError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The database could not be opened.
    #[error("failed to open SQLite database {path}: {source}")]
    Open {
        /// Database path.
        path: PathBuf,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl SqliteError {
    /// Check whether the driver reported a missing table.
    pub fn is_missing_table(&self) -> bool {
        self.to_string().contains("no such table")
    }

    /// Convert into a guard database error for the given statement.
    pub fn into_database_error(self, sql: &str) -> DatabaseError {
        match self {
            Self::Open { .. } => DatabaseError::connection(self.to_string()),
            Self::Sqlite(e) => DatabaseError::query(sql, e.to_string()),
        }
    }
}
