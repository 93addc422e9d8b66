//! The schema guard.

use std::sync::{Arc, OnceLock};

use authkit_schema::{RequirementSet, discover};
use tracing::debug;

use crate::config::{GuardConfig, GuardSettings};
use crate::database::DatabaseHandle;
use crate::error::{GuardError, GuardResult};
use crate::logger::{DiagnosticSink, LoggerResolver};
use crate::mode::GenerationMode;
use crate::probe::{ExistenceProbe, MissingRequirement, TableStatus};
use crate::synth::{MigrationSynthesizer, SynthesisReport};
use crate::validate::{EXIT_STATUS, Outcome, ValidationDispatcher};

/// Result of a full guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Validation outcome.
    pub outcome: Outcome,
    /// Tables that were missing before synthesis.
    pub missing: Vec<MissingRequirement>,
    /// Synthesis run, when a generation mode is configured and had work.
    pub synthesis: Option<SynthesisReport>,
}

/// Declared columns a live table lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDrift {
    /// Table name.
    pub table: String,
    /// Declared columns absent from the live table.
    pub missing_columns: Vec<String>,
}

/// Checks that the tables required by the active features exist.
///
/// A guard owns one configuration snapshot. Requirements are discovered
/// on first use and cached on the guard, so guards built from different
/// configurations never share them.
///
/// ```rust
/// use authkit_guard::{GuardConfig, SchemaGuard};
/// use authkit_schema::{FeatureRegistry, TemplateContext};
///
/// let registry = FeatureRegistry::builtin(&["base", "otp"], &TemplateContext::default()).unwrap();
/// let guard = SchemaGuard::new(GuardConfig::new().registry(registry));
///
/// assert_eq!(
///     guard.list_all_required_tables(),
///     vec!["account_otp_keys", "account_password_hashes", "accounts"]
/// );
/// ```
#[derive(Debug)]
pub struct SchemaGuard {
    config: GuardConfig,
    requirements: OnceLock<RequirementSet>,
    logger: LoggerResolver,
}

impl SchemaGuard {
    /// Create a guard for a configuration snapshot.
    pub fn new(config: GuardConfig) -> Self {
        let logger = LoggerResolver::new(
            config.logger_selection(),
            config.logger_registry_ref().cloned(),
        );
        Self {
            config,
            requirements: OnceLock::new(),
            logger,
        }
    }

    /// Create a guard from raw settings.
    pub fn from_settings(settings: GuardSettings) -> GuardResult<Self> {
        Ok(Self::new(settings.into_config()?))
    }

    /// The configuration snapshot.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The resolved diagnostic sink.
    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        self.logger.sink()
    }

    /// Every table required by the active features, discovered once.
    pub fn requirements(&self) -> &RequirementSet {
        self.requirements
            .get_or_init(|| discover(self.config.features(), self.config.template_context()))
    }

    /// Sorted, unique names of every required table.
    pub fn list_all_required_tables(&self) -> Vec<String> {
        self.requirements().sorted_tables()
    }

    /// Existence of every required table, in discovery order.
    pub fn table_status(&self, db: &dyn DatabaseHandle) -> Vec<TableStatus> {
        self.probe().status(self.requirements(), db)
    }

    /// Required tables that do not exist.
    pub fn missing_tables(&self, db: &dyn DatabaseHandle) -> Vec<MissingRequirement> {
        self.probe().missing(self.requirements(), db)
    }

    /// Declared columns missing from existing tables.
    ///
    /// Best effort: only tables with a parsed definition are compared, and
    /// tables whose columns cannot be listed are left out.
    pub fn column_drift(&self, db: &dyn DatabaseHandle) -> Vec<ColumnDrift> {
        let probe = self.probe();
        let requirements = self.requirements();

        requirements
            .iter()
            .filter_map(|req| {
                let table = req.table_name.as_str();
                let def = requirements.definition(table)?;
                if self.config.is_skipped(table) || !probe.exists(table, db) {
                    return None;
                }
                let live = match db.columns(table) {
                    Ok(live) => live,
                    Err(e) => {
                        debug!(table = %table, error = %e, "Cannot list columns");
                        return None;
                    }
                };
                let missing_columns: Vec<String> = def
                    .columns
                    .iter()
                    .filter(|c| !live.iter().any(|l| l.eq_ignore_ascii_case(&c.name)))
                    .map(|c| c.name.clone())
                    .collect();
                (!missing_columns.is_empty()).then(|| ColumnDrift {
                    table: table.to_string(),
                    missing_columns,
                })
            })
            .collect()
    }

    /// Probe, validate and, when configured, synthesize.
    ///
    /// Returns an error only when the validation policy raises or halts, or
    /// when synthesis fails under such a policy.
    pub fn check(&self, db: &dyn DatabaseHandle) -> GuardResult<CheckReport> {
        let requirements = self.requirements();
        let missing = self.missing_tables(db);

        let outcome = ValidationDispatcher::new(&self.config, self.sink()).validate(requirements, &missing);
        match &outcome {
            Outcome::Continue => {}
            Outcome::Raised(message) => return Err(GuardError::missing_requirements(message)),
            Outcome::Exited => return Err(GuardError::ProcessExit { code: EXIT_STATUS }),
        }

        let mode = self.config.generation_mode();
        let has_work = !missing.is_empty() || *mode == GenerationMode::Recreate;
        let synthesis = if *mode != GenerationMode::None && has_work {
            Some(self.synthesizer().synthesize(&missing, db)?)
        } else {
            None
        };

        Ok(CheckReport {
            outcome,
            missing,
            synthesis,
        })
    }

    /// Run the configured generation mode now, regardless of validation.
    pub fn generate(&self, db: &dyn DatabaseHandle) -> GuardResult<SynthesisReport> {
        self.generate_with(self.config.generation_mode(), db)
    }

    /// Run a specific generation mode now.
    pub fn generate_with(
        &self,
        mode: &GenerationMode,
        db: &dyn DatabaseHandle,
    ) -> GuardResult<SynthesisReport> {
        let missing = self.missing_tables(db);
        self.synthesizer().synthesize_with(mode, &missing, db)
    }

    fn probe(&self) -> ExistenceProbe<'_> {
        ExistenceProbe::new(&self.config, self.sink())
    }

    fn synthesizer(&self) -> MigrationSynthesizer<'_> {
        MigrationSynthesizer::new(&self.config, self.requirements(), self.sink())
    }
}

#[cfg(test)]
mod tests {
    use authkit_schema::{FeatureDefinition, FeatureRegistry, TemplateContext};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::database::testing::FakeDb;
    use crate::environment::EnvironmentSource;
    use crate::logger::{MemorySink, Severity};
    use crate::mode::ValidationMode;

    fn registry() -> FeatureRegistry {
        FeatureRegistry::builtin(&["base", "otp"], &TemplateContext::default()).unwrap()
    }

    fn guard(config: GuardConfig) -> (SchemaGuard, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let guard = SchemaGuard::new(config.registry(registry()).logger(sink.clone()));
        (guard, sink)
    }

    #[test]
    fn test_requirements_cached_per_guard() {
        let (a, _) = guard(GuardConfig::new());
        let first: *const RequirementSet = a.requirements();
        let second: *const RequirementSet = a.requirements();
        assert_eq!(first, second);

        let other = SchemaGuard::new(
            GuardConfig::new()
                .registry(FeatureRegistry::builtin(&["base"], &TemplateContext::new("member")).unwrap()),
        );
        assert_eq!(
            other.list_all_required_tables(),
            vec!["member_password_hashes", "members"]
        );
        assert_eq!(a.requirements().len(), 3);
    }

    #[test]
    fn test_registry_prefix_drives_discovery() {
        let sink = Arc::new(MemorySink::new());
        let registry =
            FeatureRegistry::builtin(&["base", "otp"], &TemplateContext::new("member")).unwrap();
        let g = SchemaGuard::new(
            GuardConfig::new()
                .registry(registry)
                .validation(ValidationMode::Skip)
                .generation(GenerationMode::Create)
                .logger(sink),
        );

        assert_eq!(g.config().template_context().prefix(), "member");
        assert_eq!(
            g.list_all_required_tables(),
            vec!["member_otp_keys", "member_password_hashes", "members"]
        );
        assert!(g.requirements().iter().all(|r| !r.table_name.starts_with("account")));

        let db = FakeDb::default();
        let synthesis = g.check(&db).unwrap().synthesis.unwrap();
        assert_eq!(
            synthesis.created,
            vec!["members", "member_password_hashes", "member_otp_keys"]
        );
        assert!(!db.has("accounts"));
        assert!(!db.has("account_password_hashes"));
    }

    #[test]
    fn test_template_applies_to_plain_registry() {
        let registry = FeatureRegistry::new()
            .with(
                FeatureDefinition::new("base")
                    .table("accounts_table", "members")
                    .template("CREATE TABLE {{ prefix | plural }} (id INTEGER PRIMARY KEY);"),
            )
            .unwrap();
        let g = SchemaGuard::new(
            GuardConfig::new()
                .registry(registry)
                .template(TemplateContext::new("member")),
        );
        assert_eq!(g.list_all_required_tables(), vec!["members"]);
    }

    #[test]
    fn test_table_status() {
        let (g, _) = guard(GuardConfig::new());
        let db = FakeDb::with_tables(&["accounts"]);
        let status = g.table_status(&db);

        let view: Vec<(&str, &str, bool)> = status
            .iter()
            .map(|s| (s.accessor.as_str(), s.table.as_str(), s.exists))
            .collect();
        assert_eq!(
            view,
            vec![
                ("accounts_table", "accounts", true),
                ("schema_template", "account_password_hashes", false),
                ("otp_keys_table", "account_otp_keys", false),
            ]
        );
    }

    #[test]
    fn test_check_warn_continues() {
        let (g, sink) = guard(GuardConfig::new().validation(ValidationMode::Warn));
        let db = FakeDb::with_tables(&["accounts", "account_password_hashes"]);

        let report = g.check(&db).unwrap();
        assert_eq!(report.outcome, Outcome::Continue);
        assert_eq!(report.missing.len(), 1);
        assert!(report.synthesis.is_none());
        assert!(sink.contains(Severity::Warn, "account_otp_keys"));
    }

    #[test]
    fn test_check_raise() {
        let (g, _) = guard(GuardConfig::new().validation(ValidationMode::Raise));
        let db = FakeDb::with_tables(&["accounts", "account_password_hashes"]);

        let err = g.check(&db).unwrap_err();
        assert!(matches!(err, GuardError::MissingRequirements { .. }));
        assert!(err.to_string().contains("account_otp_keys"));
    }

    #[test]
    fn test_check_halt_with_returning_handler() {
        let (g, _) = guard(
            GuardConfig::new()
                .validation(ValidationMode::HaltProcess)
                .exit_handler(|_| {}),
        );
        let err = g.check(&FakeDb::default()).unwrap_err();
        assert!(matches!(err, GuardError::ProcessExit { code: 1 }));
    }

    #[test]
    fn test_check_create_converges() {
        let (g, _) = guard(
            GuardConfig::new()
                .validation(ValidationMode::Skip)
                .generation(GenerationMode::Create),
        );
        let db = FakeDb::default();

        let report = g.check(&db).unwrap();
        let synthesis = report.synthesis.unwrap();
        assert!(synthesis.converged());
        assert!(g.missing_tables(&db).is_empty());

        let again = g.check(&db).unwrap();
        assert!(again.missing.is_empty());
        assert!(again.synthesis.is_none());
    }

    #[test]
    fn test_recreate_runs_with_nothing_missing() {
        let (g, _) = guard(
            GuardConfig::new()
                .generation(GenerationMode::Recreate)
                .environment(EnvironmentSource::tag("development")),
        );
        let db = FakeDb::with_tables(&["accounts", "account_password_hashes", "account_otp_keys"]);

        let report = g.check(&db).unwrap();
        let synthesis = report.synthesis.unwrap();
        assert_eq!(synthesis.dropped.len(), 3);
        assert_eq!(synthesis.created.len(), 3);
    }

    #[test]
    fn test_column_drift() {
        let feature = FeatureDefinition::new("base")
            .table("accounts_table", "accounts")
            .template("CREATE TABLE accounts (id INTEGER PRIMARY KEY, email TEXT NOT NULL);");
        let sink = Arc::new(MemorySink::new());
        let g = SchemaGuard::new(
            GuardConfig::new()
                .registry(FeatureRegistry::new().with(feature).unwrap())
                .logger(sink),
        );
        let db = FakeDb::with_tables(&["accounts"]);

        assert_eq!(
            g.column_drift(&db),
            vec![ColumnDrift {
                table: "accounts".to_string(),
                missing_columns: vec!["email".to_string()],
            }]
        );
    }

    #[test]
    fn test_generate_explicit_mode() {
        let (g, _) = guard(GuardConfig::new());
        let db = FakeDb::default();
        let report = g.generate_with(&GenerationMode::Log, &db).unwrap();
        assert!(report.script.unwrap().contains("account_otp_keys"));
        assert!(db.executed.lock().is_empty());
    }
}
