//! # authkit
//!
//! Schema guard and migration synthesizer for an authentication toolkit.
//!
//! authkit provides:
//! - Discovery of every table the enabled authentication features need,
//!   including tables that only appear inside a feature's schema template
//! - Read-only existence checks against a live database
//! - Configurable validation policies for missing tables
//! - Generation of idempotent create/drop DDL in foreign-key order, logged,
//!   written to a migration file, or executed directly
//!
//! ## Quick Start
//!
//! ```rust
//! use authkit::prelude::*;
//! use authkit::sqlite::SqliteHandle;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config: AuthkitConfig = r#"
//!     [guard]
//!     features = ["base", "otp"]
//!     validation = "warn"
//!     generation = "create"
//! "#
//! .parse()?;
//!
//! let guard = SchemaGuard::from_settings(config.guard)?;
//! let db = SqliteHandle::open_in_memory()?;
//!
//! guard.check(&db)?;
//! assert!(guard.missing_tables(&db).is_empty());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Features, templates and requirement discovery.
pub mod schema {
    pub use authkit_schema::*;
}

/// Configuration, validation and migration synthesis.
pub mod guard {
    pub use authkit_guard::*;
}

/// SQLite database handle.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use authkit_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::guard::{
        AuthkitConfig, CheckReport, DatabaseHandle, DiagnosticSink, EnvironmentSource,
        GenerationMode, GuardConfig, GuardError, GuardResult, GuardSettings, HandlerVerdict,
        LoggerRegistry, MemorySink, MissingRequirement, Outcome, SchemaGuard, Severity,
        TableStatus, ValidationMode,
    };
    pub use crate::schema::{
        Feature, FeatureDefinition, FeatureRegistry, FeatureRequirement, RequirementSet,
        TemplateContext,
    };
}

// Re-export key types at the crate root
pub use guard::{GuardConfig, GuardError, SchemaGuard};
pub use schema::{FeatureRegistry, SchemaError};
