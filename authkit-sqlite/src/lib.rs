//! SQLite database handle for the authkit schema guard.
//!
//! This crate implements [`authkit_guard::DatabaseHandle`] over `rusqlite`.
//!
//! # Features
//!
//! - In-memory and file-based databases
//! - Table existence and column introspection
//! - Attachable diagnostic listeners for failed statements
//!
//! # Example
//!
//! ```rust
//! use authkit_guard::DatabaseHandle;
//! use authkit_sqlite::SqliteHandle;
//!
//! let db = SqliteHandle::open_in_memory().unwrap().with_tracing();
//! assert!(!db.table_exists("accounts").unwrap());
//! ```

pub mod error;
pub mod handle;

pub use error::{SqliteError, SqliteResult};
pub use handle::{SqliteHandle, TracingListener};
