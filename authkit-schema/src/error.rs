//! Error types for feature definitions, template rendering and DDL extraction.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building or inspecting feature schemas.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// A schema template could not be rendered.
    #[error("failed to render schema template for feature `{feature}`: {message}")]
    #[diagnostic(code(authkit::schema::template))]
    Template { feature: String, message: String },

    /// Rendered schema output could not be parsed.
    #[error("syntax error in schema definition: {message}")]
    #[diagnostic(code(authkit::schema::syntax_error))]
    Syntax { message: String },

    /// A feature name that is not part of the built-in catalog.
    #[error("unknown feature `{name}`")]
    #[diagnostic(
        code(authkit::schema::unknown_feature),
        help("check the `features` list against the built-in feature catalog")
    )]
    UnknownFeature { name: String },

    /// The same feature was registered twice.
    #[error("feature `{name}` is already registered")]
    #[diagnostic(code(authkit::schema::duplicate_feature))]
    DuplicateFeature { name: String },
}

impl SchemaError {
    /// Create a template rendering error.
    pub fn template(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            feature: feature.into(),
            message: message.into(),
        }
    }

    /// Create a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Create an unknown feature error.
    pub fn unknown_feature(name: impl Into<String>) -> Self {
        Self::UnknownFeature { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_display() {
        let err = SchemaError::template("otp", "unknown placeholder `tenant`");
        let msg = err.to_string();
        assert!(msg.contains("otp"));
        assert!(msg.contains("tenant"));
    }

    #[test]
    fn test_unknown_feature_display() {
        let err = SchemaError::unknown_feature("magic_link");
        assert_eq!(err.to_string(), "unknown feature `magic_link`");
    }
}
