//! # authkit-guard
//!
//! Schema guard for authkit: checks that every table required by the
//! active authentication features exists, applies a validation policy
//! when some are missing, and can synthesize or execute the DDL to create
//! them in dependency order.
//!
//! ## Overview
//!
//! - [`SchemaGuard`] owns a [`GuardConfig`] snapshot and caches the
//!   discovered requirements
//! - [`ExistenceProbe`] checks tables without leaking driver diagnostics
//! - [`ValidationDispatcher`] applies the [`ValidationMode`]
//! - [`MigrationSynthesizer`] applies the [`GenerationMode`]
//! - [`LoggerResolver`] picks the [`DiagnosticSink`] for operator output
//!
//! ## Example
//!
//! ```rust,ignore
//! use authkit_guard::{AuthkitConfig, SchemaGuard};
//!
//! let config = AuthkitConfig::from_file("authkit.toml")?;
//! let guard = SchemaGuard::from_settings(config.guard)?;
//!
//! // `db` is any `DatabaseHandle`, e.g. `authkit_sqlite::SqliteHandle`.
//! guard.check(&db)?;
//! ```

pub mod config;
pub mod database;
pub mod environment;
pub mod error;
pub mod file;
pub mod guard;
pub mod logger;
pub mod logging;
pub mod mode;
pub mod probe;
pub mod sql;
pub mod synth;
pub mod validate;

pub use config::{AuthkitConfig, DEFAULT_OUTPUT_DIR, ExitHandler, GuardConfig, GuardSettings};
pub use database::{DatabaseHandle, DetachedListeners, DiagnosticListener, SqlDialect};
pub use environment::{EnvironmentSource, is_development};
pub use error::{DatabaseError, GenerationError, GuardError, GuardResult};
pub use file::MigrationWriter;
pub use guard::{CheckReport, ColumnDrift, SchemaGuard};
pub use logger::{
    DiagnosticSink, LogRecord, LoggerRegistry, LoggerResolver, LoggerSelection, MemorySink,
    Severity, StdoutSink, TracingSink,
};
pub use mode::{GenerationMode, HandlerVerdict, ValidationHandler, ValidationMode};
pub use probe::{ExistenceProbe, MissingRequirement, TableStatus};
pub use sql::{MigrationSql, SqlGenerator, Statement, StatementKind, creation_order, drop_order};
pub use synth::{MigrationSynthesizer, SynthesisReport};
pub use validate::{Outcome, ValidationDispatcher, report};
