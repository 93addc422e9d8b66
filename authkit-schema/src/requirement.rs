//! Table requirements declared by features.

use std::fmt;

use indexmap::IndexMap;

use crate::parser::TableDefinition;

/// Accessor name recorded for tables recovered from a schema template.
pub const HIDDEN_ACCESSOR: &str = "schema_template";

/// How a requirement was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Declared through a named requirement accessor.
    Explicit,
    /// Recovered from a feature's rendered schema template.
    Hidden,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit"),
            Self::Hidden => f.write_str("hidden"),
        }
    }
}

/// A table a feature exposes through a named accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRequirement {
    /// Accessor name, e.g. `otp_keys_table`.
    pub accessor: String,
    /// Physical table name.
    pub table: String,
}

impl TableRequirement {
    /// Create a new table requirement.
    pub fn new(accessor: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            accessor: accessor.into(),
            table: table.into(),
        }
    }
}

/// One path through which a table is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Feature that requires the table.
    pub feature: String,
    /// Accessor the table was reached through.
    pub accessor: String,
    /// Whether the table was declared or recovered from a template.
    pub origin: Origin,
}

/// A single required table together with the features that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequirement {
    /// Feature that first declared the table.
    pub feature_name: String,
    /// Accessor the table was first reached through.
    pub requirement_accessor: String,
    /// Physical table name.
    pub table_name: String,
    /// How the first declaration was discovered.
    pub origin: Origin,
    /// Further features or accessors mapping to the same table.
    pub also_required_by: Vec<Provenance>,
}

impl FeatureRequirement {
    /// Create an explicit requirement.
    pub fn explicit(
        feature: impl Into<String>,
        accessor: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            feature_name: feature.into(),
            requirement_accessor: accessor.into(),
            table_name: table.into(),
            origin: Origin::Explicit,
            also_required_by: Vec::new(),
        }
    }

    /// Create a hidden requirement recovered from a schema template.
    pub fn hidden(feature: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            feature_name: feature.into(),
            requirement_accessor: HIDDEN_ACCESSOR.to_string(),
            table_name: table.into(),
            origin: Origin::Hidden,
            also_required_by: Vec::new(),
        }
    }

    /// Check if this requirement was recovered from a template.
    pub fn is_hidden(&self) -> bool {
        self.origin == Origin::Hidden
    }

    /// Names of every feature requiring this table, first declaration first.
    pub fn features(&self) -> Vec<&str> {
        let mut names = vec![self.feature_name.as_str()];
        for p in &self.also_required_by {
            if !names.contains(&p.feature.as_str()) {
                names.push(&p.feature);
            }
        }
        names
    }

    /// Diagnostic line: `table (feature: X, accessor: Y)`.
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} (feature: {}, accessor: {})",
            self.table_name, self.feature_name, self.requirement_accessor
        );
        if !self.also_required_by.is_empty() {
            let others: Vec<String> = self
                .also_required_by
                .iter()
                .map(|p| format!("{}.{}", p.feature, p.accessor))
                .collect();
            line.push_str(&format!(" [also required by: {}]", others.join(", ")));
        }
        line
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            feature: self.feature_name.clone(),
            accessor: self.requirement_accessor.clone(),
            origin: self.origin,
        }
    }
}

/// The deduplicated set of tables required by the active features.
///
/// Keys are table names in discovery order: declaration order of features,
/// then accessors, then hidden tables in render order.
#[derive(Debug, Clone, Default)]
pub struct RequirementSet {
    requirements: IndexMap<String, FeatureRequirement>,
    definitions: IndexMap<String, TableDefinition>,
}

impl RequirementSet {
    /// Create an empty requirement set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement, merging provenance when the table is already known.
    pub fn insert(&mut self, requirement: FeatureRequirement) {
        match self.requirements.get_mut(&requirement.table_name) {
            Some(existing) => {
                let provenance = requirement.provenance();
                let duplicate = (existing.feature_name == provenance.feature
                    && existing.requirement_accessor == provenance.accessor)
                    || existing.also_required_by.contains(&provenance);
                if !duplicate {
                    existing.also_required_by.push(provenance);
                }
            }
            None => {
                self.requirements
                    .insert(requirement.table_name.clone(), requirement);
            }
        }
    }

    /// Record the parsed definition of a table. The first definition wins.
    pub fn add_definition(&mut self, definition: TableDefinition) {
        self.definitions
            .entry(definition.name.clone())
            .or_insert(definition);
    }

    /// Get the requirement for a table.
    pub fn get(&self, table: &str) -> Option<&FeatureRequirement> {
        self.requirements.get(table)
    }

    /// Check if a table is required.
    pub fn contains(&self, table: &str) -> bool {
        self.requirements.contains_key(table)
    }

    /// Number of distinct required tables.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Check if nothing is required.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Iterate requirements in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureRequirement> {
        self.requirements.values()
    }

    /// Table names in discovery order.
    pub fn tables(&self) -> Vec<&str> {
        self.requirements.keys().map(String::as_str).collect()
    }

    /// Table names sorted alphabetically.
    pub fn sorted_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.requirements.keys().cloned().collect();
        tables.sort();
        tables
    }

    /// Parsed definition of a table, if any template declared it.
    pub fn definition(&self, table: &str) -> Option<&TableDefinition> {
        self.definitions.get(table)
    }

    /// All parsed definitions, in render order.
    pub fn definitions(&self) -> impl Iterator<Item = &TableDefinition> {
        self.definitions.values()
    }
}

impl<'a> IntoIterator for &'a RequirementSet {
    type Item = &'a FeatureRequirement;
    type IntoIter = indexmap::map::Values<'a, String, FeatureRequirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.requirements.values()
    }
}
