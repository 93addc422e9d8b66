//! Environment gating for destructive generation modes.

use std::env;

/// Default variable holding the environment tag.
pub const DEFAULT_ENVIRONMENT_VAR: &str = "AUTHKIT_ENV";

/// Tags under which destructive generation is allowed.
pub const DEVELOPMENT_TAGS: &[&str] = &["development", "dev", "test", "testing"];

/// Where the environment tag comes from.
///
/// The tag is read every time it is needed, never at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// A process environment variable.
    Variable(String),
    /// A fixed tag.
    Tag(String),
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::Variable(DEFAULT_ENVIRONMENT_VAR.to_string())
    }
}

impl EnvironmentSource {
    /// Read from an environment variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Use a fixed tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    /// Current tag, if any.
    pub fn current(&self) -> Option<String> {
        match self {
            Self::Variable(name) => env::var(name).ok().filter(|v| !v.trim().is_empty()),
            Self::Tag(tag) => Some(tag.clone()),
        }
    }

    /// Check whether the current tag is a development or test environment.
    pub fn allows_destructive(&self) -> bool {
        self.current().is_some_and(|tag| is_development(&tag))
    }

    /// Human-readable description of the current tag.
    pub fn describe(&self) -> String {
        match (self, self.current()) {
            (_, Some(tag)) => format!("`{}`", tag),
            (Self::Variable(name), None) => format!("unset (${})", name),
            (Self::Tag(_), None) => "unset".to_string(),
        }
    }
}

/// Check whether a tag names a development or test environment.
pub fn is_development(tag: &str) -> bool {
    let tag = tag.trim().to_lowercase();
    DEVELOPMENT_TAGS.contains(&tag.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_tags() {
        assert!(is_development("development"));
        assert!(is_development("Test"));
        assert!(is_development(" dev "));
        assert!(!is_development("production"));
        assert!(!is_development("staging"));
        assert!(!is_development(""));
    }

    #[test]
    fn test_fixed_tag() {
        assert!(EnvironmentSource::tag("test").allows_destructive());
        assert!(!EnvironmentSource::tag("production").allows_destructive());
        assert_eq!(EnvironmentSource::tag("production").describe(), "`production`");
    }

    #[test]
    fn test_variable_read_at_call_time() {
        let var = "AUTHKIT_ENV_TEST_VARIABLE_READ_AT_CALL_TIME";
        let source = EnvironmentSource::variable(var);
        assert!(!source.allows_destructive());
        assert!(source.describe().contains(var));

        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var(var, "development") };
        assert!(source.allows_destructive());

        // SAFETY: as above.
        unsafe { env::set_var(var, "production") };
        assert!(!source.allows_destructive());

        // SAFETY: as above.
        unsafe { env::remove_var(var) };
    }
}
