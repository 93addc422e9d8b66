//! Validation policy dispatch.

use std::sync::Arc;

use authkit_schema::RequirementSet;
use tracing::{debug, error};

use crate::config::GuardConfig;
use crate::logger::DiagnosticSink;
use crate::mode::{HandlerVerdict, ValidationMode};
use crate::probe::MissingRequirement;

/// Exit status used by the halt policy.
pub const EXIT_STATUS: i32 = 1;

/// Result of applying the validation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Startup may continue.
    Continue,
    /// The policy raised with this message.
    Raised(String),
    /// The policy terminated the process.
    Exited,
}

impl Outcome {
    /// Check whether startup may continue.
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Applies the configured [`ValidationMode`] to a list of missing tables.
pub struct ValidationDispatcher<'a> {
    config: &'a GuardConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl<'a> ValidationDispatcher<'a> {
    /// Create a dispatcher for a configuration.
    pub fn new(config: &'a GuardConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { config, sink }
    }

    /// Apply the configured validation mode.
    pub fn validate(&self, requirements: &RequirementSet, missing: &[MissingRequirement]) -> Outcome {
        self.validate_with(self.config.validation_mode(), requirements, missing)
    }

    /// Apply a specific validation mode.
    pub fn validate_with(
        &self,
        mode: &ValidationMode,
        requirements: &RequirementSet,
        missing: &[MissingRequirement],
    ) -> Outcome {
        if missing.is_empty() {
            debug!(mode = mode.name(), "All required tables present");
            return Outcome::Continue;
        }

        debug!(mode = mode.name(), missing = missing.len(), "Applying validation policy");

        match mode {
            ValidationMode::Skip => Outcome::Continue,
            ValidationMode::Warn => {
                self.sink.warn(&report(missing));
                Outcome::Continue
            }
            ValidationMode::ErrorLog => {
                self.sink.error(&report(missing));
                Outcome::Continue
            }
            ValidationMode::Raise => {
                let message = report(missing);
                self.sink.error(&message);
                Outcome::Raised(message)
            }
            ValidationMode::HaltProcess => {
                self.sink.error(&report(missing));
                error!(status = EXIT_STATUS, "Halting on missing tables");
                self.config.exit(EXIT_STATUS);
                Outcome::Exited
            }
            ValidationMode::Custom(handler) => match handler(missing, requirements) {
                HandlerVerdict::Continue => Outcome::Continue,
                HandlerVerdict::RaiseWithDefaultMessage => Outcome::Raised(report(missing)),
                HandlerVerdict::RaiseWithMessage(message) => Outcome::Raised(message),
            },
        }
    }
}

/// Format the missing table report shared by every mode.
///
/// ```text
/// authkit: 1 required table is missing from the database:
///   - account_otp_keys (feature: otp, accessor: otp_keys_table)
///
/// To create it, set `generation = "create"` or write a migration with `generation = "migration"`.
/// To skip tables, list them in `skip_tables`.
/// To silence this check, set `validation = "skip"`.
/// ```
pub fn report(missing: &[MissingRequirement]) -> String {
    let (noun, verb, pronoun) = if missing.len() == 1 {
        ("table", "is", "it")
    } else {
        ("tables", "are", "them")
    };

    let mut out = format!(
        "authkit: {} required {} {} missing from the database:\n",
        missing.len(),
        noun,
        verb
    );
    for m in missing {
        out.push_str("  - ");
        out.push_str(&m.requirement.describe());
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&format!(
        "To create {}, set `generation = \"create\"` or write a migration with `generation = \"migration\"`.\n",
        pronoun
    ));
    out.push_str("To skip tables, list them in `skip_tables`.\n");
    out.push_str("To silence this check, set `validation = \"skip\"`.");
    out
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use authkit_schema::FeatureRequirement;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::logger::{MemorySink, Severity};

    fn otp_missing() -> (RequirementSet, Vec<MissingRequirement>) {
        let req = FeatureRequirement::explicit("otp", "otp_keys_table", "account_otp_keys");
        let mut set = RequirementSet::new();
        set.insert(FeatureRequirement::explicit("base", "accounts_table", "accounts"));
        set.insert(req.clone());
        (set, vec![MissingRequirement::new(req)])
    }

    fn dispatch(config: &GuardConfig) -> (Outcome, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let (set, missing) = otp_missing();
        let outcome = ValidationDispatcher::new(config, sink.clone()).validate(&set, &missing);
        (outcome, sink)
    }

    #[test]
    fn test_report_format() {
        let (_, missing) = otp_missing();
        let text = report(&missing);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "authkit: 1 required table is missing from the database:");
        assert_eq!(
            lines[1],
            "  - account_otp_keys (feature: otp, accessor: otp_keys_table)"
        );
        assert!(text.contains("generation = \"create\""));
        assert!(text.contains("skip_tables"));
        assert!(text.contains("validation = \"skip\""));
    }

    #[test]
    fn test_nothing_missing_continues() {
        let config = GuardConfig::new().validation(ValidationMode::Raise);
        let sink = Arc::new(MemorySink::new());
        let outcome = ValidationDispatcher::new(&config, sink.clone()).validate(&RequirementSet::new(), &[]);
        assert_eq!(outcome, Outcome::Continue);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_skip_is_silent() {
        let (outcome, sink) = dispatch(&GuardConfig::new().validation(ValidationMode::Skip));
        assert_eq!(outcome, Outcome::Continue);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_warn_continues() {
        let (outcome, sink) = dispatch(&GuardConfig::new().validation(ValidationMode::Warn));
        assert_eq!(outcome, Outcome::Continue);
        assert!(sink.contains(Severity::Warn, "account_otp_keys"));
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn test_error_log_continues() {
        let (outcome, sink) = dispatch(&GuardConfig::new().validation(ValidationMode::ErrorLog));
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_raise_mentions_table() {
        let (outcome, sink) = dispatch(&GuardConfig::new().validation(ValidationMode::Raise));
        let Outcome::Raised(message) = outcome else {
            panic!("expected raise");
        };
        assert!(message.contains("account_otp_keys"));
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_halt_calls_exit_handler() {
        let status = Arc::new(AtomicI32::new(0));
        let seen = status.clone();
        let config = GuardConfig::new()
            .validation(ValidationMode::HaltProcess)
            .exit_handler(move |code| seen.store(code, Ordering::SeqCst));

        let (outcome, sink) = dispatch(&config);
        assert_eq!(outcome, Outcome::Exited);
        assert_eq!(status.load(Ordering::SeqCst), EXIT_STATUS);
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_custom_message_is_exact() {
        let config = GuardConfig::new().validation(ValidationMode::custom(|_, _| "retry later"));
        let (outcome, _) = dispatch(&config);
        assert_eq!(outcome, Outcome::Raised("retry later".to_string()));
    }

    #[test]
    fn test_custom_default_message() {
        let config = GuardConfig::new()
            .validation(ValidationMode::custom(|_, _| HandlerVerdict::RaiseWithDefaultMessage));
        let (outcome, _) = dispatch(&config);
        assert!(matches!(outcome, Outcome::Raised(m) if m.contains("account_otp_keys")));
    }

    #[test]
    fn test_custom_sees_requirements() {
        let config = GuardConfig::new().validation(ValidationMode::custom(|missing, all| {
            assert_eq!(missing.len(), 1);
            assert_eq!(all.len(), 2);
        }));
        let (outcome, sink) = dispatch(&config);
        assert_eq!(outcome, Outcome::Continue);
        assert!(sink.records().is_empty());
    }
}
