//! # authkit-schema
//!
//! Table requirements for authkit features.
//!
//! This crate provides:
//! - The [`Feature`] trait and a typed [`FeatureRegistry`] of active features
//! - A catalog of built-in authentication features and their schemas
//! - Schema template rendering with a table prefix and pluralization helper
//! - DDL extraction that recovers `CREATE TABLE` statements from rendered output
//! - Requirement discovery, including "hidden" tables that only exist in a
//!   feature's template
//!
//! ## Example
//!
//! ```rust
//! use authkit_schema::{FeatureRegistry, TemplateContext, discover};
//!
//! let ctx = TemplateContext::default();
//! let registry = FeatureRegistry::builtin(&["base", "otp"], &ctx).unwrap();
//! let requirements = discover(&registry, &ctx);
//!
//! assert!(requirements.contains("accounts"));
//! assert!(requirements.contains("account_password_hashes"));
//! assert!(requirements.contains("account_otp_keys"));
//! ```

pub mod builtin;
pub mod discovery;
pub mod error;
pub mod feature;
pub mod parser;
pub mod requirement;
pub mod template;

pub use discovery::discover;
pub use error::{SchemaError, SchemaResult};
pub use feature::{Feature, FeatureDefinition, FeatureRegistry};
pub use parser::{ColumnSpec, TableDefinition, created_tables, parse_tables};
pub use requirement::{
    FeatureRequirement, HIDDEN_ACCESSOR, Origin, Provenance, RequirementSet, TableRequirement,
};
pub use template::{TemplateContext, pluralize, singularize};
