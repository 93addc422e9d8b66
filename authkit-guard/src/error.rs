//! Error types for the schema guard.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use std::path::PathBuf;

use authkit_schema::SchemaError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors surfaced by the schema guard.
#[derive(Debug, Error, Diagnostic)]
pub enum GuardError {
    /// An unrecognized configuration value.
    #[error("invalid {setting} `{value}`: expected one of {expected}")]
    #[diagnostic(code(authkit::guard::configuration))]
    Configuration {
        /// Setting name.
        setting: String,
        /// Rejected value.
        value: String,
        /// Accepted values.
        expected: String,
    },

    /// Required tables are missing and the validation policy raises.
    #[error("{message}")]
    #[diagnostic(code(authkit::guard::missing_requirements))]
    MissingRequirements {
        /// Full diagnostic message.
        message: String,
    },

    /// The halt policy fired but the installed exit handler returned.
    #[error("process exit requested with status {code}")]
    #[diagnostic(code(authkit::guard::process_exit))]
    ProcessExit {
        /// Exit status passed to the exit handler.
        code: i32,
    },

    /// DDL synthesis or execution failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] GenerationError),

    /// The existence probe failed for a reason other than a missing table.
    #[error("existence check for `{table}` failed, assuming it exists: {source}")]
    #[diagnostic(code(authkit::guard::probe_degraded))]
    ProbeDegraded {
        /// Probed table.
        table: String,
        /// Underlying database error.
        #[source]
        source: DatabaseError,
    },

    /// Feature schema error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    #[diagnostic(code(authkit::guard::config_io))]
    ConfigIo {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    #[diagnostic(code(authkit::guard::config_parse))]
    ConfigParse(#[from] toml::de::Error),
}

impl GuardError {
    /// Create a configuration error.
    pub fn configuration(
        setting: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            setting: setting.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a missing requirements error.
    pub fn missing_requirements(message: impl Into<String>) -> Self {
        Self::MissingRequirements {
            message: message.into(),
        }
    }
}

/// Errors raised while rendering or executing synthesized DDL.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    /// A statement failed against the database.
    #[error("statement {position} ({table}) failed: {source}\n{statement}")]
    #[diagnostic(
        code(authkit::guard::generation::execution),
        help("the schema may be partially applied; DDL is not rolled back")
    )]
    Execution {
        /// 1-based position of the statement in the executed sequence.
        position: usize,
        /// Table the statement targets.
        table: String,
        /// Statement text.
        statement: String,
        /// Underlying database error.
        #[source]
        source: DatabaseError,
    },

    /// The migration script could not be written.
    #[error("failed to write migration file {path}")]
    #[diagnostic(code(authkit::guard::generation::io))]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a database handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// A statement or query failed.
    #[error("query failed: {message}")]
    Query {
        /// Statement text.
        sql: String,
        /// Driver message.
        message: String,
    },

    /// The connection is unusable.
    #[error("connection error: {0}")]
    Connection(String),
}

impl DatabaseError {
    /// Create a query error.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}
