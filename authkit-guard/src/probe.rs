//! Read-only table existence checks.

use std::sync::Arc;

use authkit_schema::{FeatureRequirement, RequirementSet};
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::database::{DatabaseHandle, DetachedListeners};
use crate::error::GuardError;
use crate::logger::DiagnosticSink;

/// A required table that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRequirement {
    /// The requirement that is not satisfied.
    pub requirement: FeatureRequirement,
    /// Always `false`.
    pub exists: bool,
}

impl MissingRequirement {
    /// Wrap an unsatisfied requirement.
    pub fn new(requirement: FeatureRequirement) -> Self {
        Self {
            requirement,
            exists: false,
        }
    }

    /// Missing table name.
    pub fn table(&self) -> &str {
        &self.requirement.table_name
    }
}

/// Existence of one required table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    /// Feature that first declared the table.
    pub feature: String,
    /// Accessor the table was first reached through.
    pub accessor: String,
    /// Table name.
    pub table: String,
    /// Whether the table exists (or is skipped).
    pub exists: bool,
}

/// Checks whether tables exist without creating diagnostic noise.
pub struct ExistenceProbe<'a> {
    config: &'a GuardConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl<'a> ExistenceProbe<'a> {
    /// Create a probe honoring the configuration's skip list.
    pub fn new(config: &'a GuardConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { config, sink }
    }

    /// Check whether `table` exists.
    ///
    /// Skipped tables are reported as existing. The handle's diagnostic
    /// listeners are detached for the duration of the check. A failing
    /// check is logged as a warning and treated as "exists".
    pub fn exists(&self, table: &str, db: &dyn DatabaseHandle) -> bool {
        if self.config.is_skipped(table) {
            debug!(table = %table, "Skipping existence check");
            return true;
        }

        let result = {
            let _detached = DetachedListeners::new(db);
            db.table_exists(table)
        };

        match result {
            Ok(exists) => {
                debug!(table = %table, exists, "Checked table");
                exists
            }
            Err(source) => {
                let degraded = GuardError::ProbeDegraded {
                    table: table.to_string(),
                    source,
                };
                warn!(table = %table, error = %degraded, "Existence check failed");
                self.sink.warn(&degraded.to_string());
                true
            }
        }
    }

    /// Status of every required table, in discovery order.
    pub fn status(&self, requirements: &RequirementSet, db: &dyn DatabaseHandle) -> Vec<TableStatus> {
        requirements
            .iter()
            .map(|req| TableStatus {
                feature: req.feature_name.clone(),
                accessor: req.requirement_accessor.clone(),
                table: req.table_name.clone(),
                exists: self.exists(&req.table_name, db),
            })
            .collect()
    }

    /// Required tables that do not exist, in discovery order.
    pub fn missing(
        &self,
        requirements: &RequirementSet,
        db: &dyn DatabaseHandle,
    ) -> Vec<MissingRequirement> {
        requirements
            .iter()
            .filter(|req| !self.exists(&req.table_name, db))
            .cloned()
            .map(MissingRequirement::new)
            .collect()
    }
}
