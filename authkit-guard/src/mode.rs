//! Validation and generation policies.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use authkit_schema::RequirementSet;

use crate::error::{GuardError, GuardResult};
use crate::probe::MissingRequirement;

/// What a custom validation handler asks the guard to do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandlerVerdict {
    /// Carry on.
    #[default]
    Continue,
    /// Raise with the standard missing-table report.
    RaiseWithDefaultMessage,
    /// Raise with exactly this message.
    RaiseWithMessage(String),
}

impl From<()> for HandlerVerdict {
    fn from(_: ()) -> Self {
        Self::Continue
    }
}

impl From<&str> for HandlerVerdict {
    fn from(message: &str) -> Self {
        Self::RaiseWithMessage(message.to_string())
    }
}

impl From<String> for HandlerVerdict {
    fn from(message: String) -> Self {
        Self::RaiseWithMessage(message)
    }
}

impl From<Option<String>> for HandlerVerdict {
    fn from(message: Option<String>) -> Self {
        message.map_or(Self::Continue, Self::RaiseWithMessage)
    }
}

/// A user-supplied validation handler.
pub type ValidationHandler =
    Arc<dyn Fn(&[MissingRequirement], &RequirementSet) -> HandlerVerdict + Send + Sync>;

/// Policy applied when required tables are missing.
#[derive(Clone, Default)]
pub enum ValidationMode {
    /// Do nothing.
    Skip,
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Log an error and continue.
    ErrorLog,
    /// Log an error and raise.
    Raise,
    /// Log an error and terminate the process.
    HaltProcess,
    /// Delegate to a handler.
    Custom(ValidationHandler),
}

impl ValidationMode {
    /// Accepted configuration values.
    pub const VALUES: &'static str = "skip, silent, warn, error, raise, halt, exit";

    /// Wrap a closure as a custom handler.
    ///
    /// ```rust
    /// use authkit_guard::ValidationMode;
    ///
    /// let mode = ValidationMode::custom(|missing, _| {
    ///     if missing.is_empty() { None } else { Some("retry later".to_string()) }
    /// });
    /// assert_eq!(mode.name(), "custom");
    /// ```
    pub fn custom<F, R>(handler: F) -> Self
    where
        F: Fn(&[MissingRequirement], &RequirementSet) -> R + Send + Sync + 'static,
        R: Into<HandlerVerdict>,
    {
        Self::Custom(Arc::new(
            move |missing: &[MissingRequirement], requirements: &RequirementSet| {
                handler(missing, requirements).into()
            },
        ))
    }

    /// Name used in configuration and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Warn => "warn",
            Self::ErrorLog => "error",
            Self::Raise => "raise",
            Self::HaltProcess => "halt",
            Self::Custom(_) => "custom",
        }
    }

    /// Check whether generation failures propagate under this mode.
    pub fn propagates_failures(&self) -> bool {
        matches!(self, Self::Raise | Self::HaltProcess)
    }
}

impl fmt::Debug for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "Skip",
            Self::Warn => "Warn",
            Self::ErrorLog => "ErrorLog",
            Self::Raise => "Raise",
            Self::HaltProcess => "HaltProcess",
            Self::Custom(_) => "Custom(..)",
        })
    }
}

impl FromStr for ValidationMode {
    type Err = GuardError;

    fn from_str(s: &str) -> GuardResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "silent" => Ok(Self::Skip),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::ErrorLog),
            "raise" => Ok(Self::Raise),
            "halt" | "exit" => Ok(Self::HaltProcess),
            _ => Err(GuardError::configuration(
                "validation mode",
                s,
                Self::VALUES,
            )),
        }
    }
}

/// Policy for producing DDL for missing tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Generate nothing.
    #[default]
    None,
    /// Write the script to the diagnostic sink.
    Log,
    /// Write the script to a timestamped file in a directory.
    EmitFile(PathBuf),
    /// Execute create statements for missing tables.
    Create,
    /// Drop and recreate missing tables. Development and test only.
    Sync,
    /// Drop and recreate every required table. Development and test only.
    Recreate,
}

impl GenerationMode {
    /// Accepted configuration values.
    pub const VALUES: &'static str = "log, migration, file, create, sync, recreate, none";

    /// Parse a configuration value. File emission writes into `output_dir`.
    pub fn parse(value: &str, output_dir: impl Into<PathBuf>) -> GuardResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "log" => Ok(Self::Log),
            "migration" | "file" => Ok(Self::EmitFile(output_dir.into())),
            "create" => Ok(Self::Create),
            "sync" => Ok(Self::Sync),
            "recreate" => Ok(Self::Recreate),
            _ => Err(GuardError::configuration(
                "generation mode",
                value,
                Self::VALUES,
            )),
        }
    }

    /// Name used in configuration and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Log => "log",
            Self::EmitFile(_) => "migration",
            Self::Create => "create",
            Self::Sync => "sync",
            Self::Recreate => "recreate",
        }
    }

    /// Check whether this mode drops tables.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Sync | Self::Recreate)
    }

    /// Check whether this mode runs statements against the database.
    pub fn executes(&self) -> bool {
        matches!(self, Self::Create | Self::Sync | Self::Recreate)
    }
}

impl FromStr for GenerationMode {
    type Err = GuardError;

    fn from_str(s: &str) -> GuardResult<Self> {
        Self::parse(s, crate::config::DEFAULT_OUTPUT_DIR)
    }
}
