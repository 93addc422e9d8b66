//! Migration synthesis and execution.

use std::path::PathBuf;
use std::sync::Arc;

use authkit_schema::RequirementSet;
use tracing::{debug, error, info};

use crate::config::GuardConfig;
use crate::database::DatabaseHandle;
use crate::error::{GenerationError, GuardError, GuardResult};
use crate::file::MigrationWriter;
use crate::logger::DiagnosticSink;
use crate::mode::GenerationMode;
use crate::probe::{ExistenceProbe, MissingRequirement};
use crate::sql::{MigrationSql, SqlGenerator, Statement, StatementKind};

/// What a synthesis run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Generation mode that ran.
    pub mode: GenerationMode,
    /// Rendered script, for the log mode.
    pub script: Option<String>,
    /// Written migration file, for the file mode.
    pub file: Option<PathBuf>,
    /// Tables dropped, in execution order.
    pub dropped: Vec<String>,
    /// Tables created, in execution order.
    pub created: Vec<String>,
    /// Tables skipped because no definition is known.
    pub undefined: Vec<String>,
    /// Whether a destructive mode was refused by environment gating.
    pub refused: bool,
    /// Failure that was reported but not propagated.
    pub failure: Option<String>,
    /// Tables still missing after execution.
    pub residual: Vec<String>,
}

impl SynthesisReport {
    fn new(mode: &GenerationMode) -> Self {
        Self {
            mode: mode.clone(),
            ..Default::default()
        }
    }

    /// Check whether execution ran and every required table now exists.
    pub fn converged(&self) -> bool {
        self.mode.executes() && !self.refused && self.failure.is_none() && self.residual.is_empty()
    }
}

/// Builds DDL for missing tables and applies the configured generation mode.
pub struct MigrationSynthesizer<'a> {
    config: &'a GuardConfig,
    requirements: &'a RequirementSet,
    sink: Arc<dyn DiagnosticSink>,
}

impl<'a> MigrationSynthesizer<'a> {
    /// Create a synthesizer over a requirement set.
    pub fn new(
        config: &'a GuardConfig,
        requirements: &'a RequirementSet,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            config,
            requirements,
            sink,
        }
    }

    /// Apply the configured generation mode.
    pub fn synthesize(
        &self,
        missing: &[MissingRequirement],
        db: &dyn DatabaseHandle,
    ) -> GuardResult<SynthesisReport> {
        self.synthesize_with(self.config.generation_mode(), missing, db)
    }

    /// Apply a specific generation mode.
    ///
    /// Execution failures are reported through the sink and returned only
    /// when the validation mode is `Raise` or `HaltProcess`. Nothing is
    /// rolled back.
    pub fn synthesize_with(
        &self,
        mode: &GenerationMode,
        missing: &[MissingRequirement],
        db: &dyn DatabaseHandle,
    ) -> GuardResult<SynthesisReport> {
        let mut report = SynthesisReport::new(mode);
        let generator = SqlGenerator::new(db.dialect());
        let missing_tables: Vec<&str> = missing.iter().map(MissingRequirement::table).collect();

        if mode.is_destructive() && !self.config.environment_source().allows_destructive() {
            let message = format!(
                "authkit: refusing to run `{}` generation in environment {}; destructive generation requires a development or test environment",
                mode.name(),
                self.config.environment_source().describe()
            );
            error!(mode = mode.name(), "Destructive generation refused");
            self.sink.error(&message);
            report.refused = true;
            return Ok(report);
        }

        debug!(mode = mode.name(), missing = missing_tables.len(), "Synthesizing migration");

        let result = match mode {
            GenerationMode::None => Ok(()),
            GenerationMode::Log => {
                let migration = generator.generate(&missing_tables, self.requirements);
                let script = migration.render();
                self.sink.info(&format!(
                    "authkit: migration for missing tables:\n{}",
                    script
                ));
                report.undefined = owned(migration.undefined_tables());
                report.script = Some(script);
                Ok(())
            }
            GenerationMode::EmitFile(dir) => {
                let migration = generator.generate(&missing_tables, self.requirements);
                report.undefined = owned(migration.undefined_tables());
                MigrationWriter::new(dir).write(&migration).map(|path| {
                    self.sink
                        .info(&format!("authkit: wrote migration to {}", path.display()));
                    report.file = Some(path);
                })
            }
            GenerationMode::Create => {
                let migration = generator.generate(&missing_tables, self.requirements);
                self.run(&migration.up, db, &mut report)
            }
            GenerationMode::Sync => {
                let migration = generator.generate(&missing_tables, self.requirements);
                self.run_all(&migration, db, &mut report)
            }
            GenerationMode::Recreate => {
                let all: Vec<&str> = self
                    .requirements
                    .tables()
                    .into_iter()
                    .filter(|t| !self.config.is_skipped(t))
                    .collect();
                let mut migration = generator.generate(&all, self.requirements);
                let probe = ExistenceProbe::new(self.config, self.sink.clone());
                // Never drop a table that cannot be recreated.
                migration.down.retain(|s| {
                    self.requirements.definition(&s.table).is_some() && probe.exists(&s.table, db)
                });
                self.run_all(&migration, db, &mut report)
            }
        };

        if let Err(err) = result {
            return self.fail(err, report);
        }

        for table in &report.undefined {
            self.sink.warn(&format!(
                "authkit: no schema definition known for `{}`; create it manually",
                table
            ));
        }

        if mode.executes() {
            self.revalidate(db, &mut report);
        }

        Ok(report)
    }

    fn run_all(
        &self,
        migration: &MigrationSql,
        db: &dyn DatabaseHandle,
        report: &mut SynthesisReport,
    ) -> Result<(), GenerationError> {
        let statements: Vec<Statement> = migration
            .down
            .iter()
            .chain(migration.up.iter())
            .cloned()
            .collect();
        self.run(&statements, db, report)
    }

    fn run(
        &self,
        statements: &[Statement],
        db: &dyn DatabaseHandle,
        report: &mut SynthesisReport,
    ) -> Result<(), GenerationError> {
        for (i, stmt) in statements.iter().enumerate() {
            if !stmt.is_executable() {
                report.undefined.push(stmt.table.clone());
                continue;
            }

            debug!(table = %stmt.table, sql = %stmt.sql, "Executing statement");
            db.execute(&stmt.sql)
                .map_err(|source| GenerationError::Execution {
                    position: i + 1,
                    table: stmt.table.clone(),
                    statement: stmt.sql.clone(),
                    source,
                })?;

            match stmt.kind {
                StatementKind::Create => report.created.push(stmt.table.clone()),
                StatementKind::Drop => report.dropped.push(stmt.table.clone()),
                StatementKind::Undefined => {}
            }
        }
        Ok(())
    }

    fn fail(&self, err: GenerationError, mut report: SynthesisReport) -> GuardResult<SynthesisReport> {
        let message = format!("authkit: migration failed: {}", err);
        error!(error = %err, "Migration failed");
        self.sink.error(&message);

        if self.config.validation_mode().propagates_failures() {
            return Err(GuardError::Generation(err));
        }

        report.failure = Some(err.to_string());
        Ok(report)
    }

    fn revalidate(&self, db: &dyn DatabaseHandle, report: &mut SynthesisReport) {
        let probe = ExistenceProbe::new(self.config, self.sink.clone());
        let residual = probe.missing(self.requirements, db);
        report.residual = residual.iter().map(|m| m.table().to_string()).collect();

        if residual.is_empty() {
            info!(
                created = report.created.len(),
                dropped = report.dropped.len(),
                "Schema converged"
            );
            self.sink.info(&format!(
                "authkit: schema is up to date ({} created, {} dropped)",
                report.created.len(),
                report.dropped.len()
            ));
        } else {
            self.sink.error(&format!(
                "authkit: {} required table(s) still missing after migration: {}",
                residual.len(),
                report.residual.join(", ")
            ));
        }
    }
}

fn owned(tables: Vec<&str>) -> Vec<String> {
    tables.into_iter().map(str::to_string).collect()
}
