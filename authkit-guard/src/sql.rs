//! DDL generation and dependency ordering.

use authkit_schema::{RequirementSet, TableDefinition};
use tracing::warn;

use crate::database::SqlDialect;

/// Kind of a generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `CREATE TABLE IF NOT EXISTS`.
    Create,
    /// `DROP TABLE IF EXISTS`.
    Drop,
    /// A comment standing in for a table with no known definition.
    Undefined,
}

/// A single generated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Target table.
    pub table: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// SQL text.
    pub sql: String,
}

impl Statement {
    /// Check whether the statement can be executed.
    pub fn is_executable(&self) -> bool {
        self.kind != StatementKind::Undefined
    }
}

/// Generated migration with apply and revert sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSql {
    /// Create statements in creation order.
    pub up: Vec<Statement>,
    /// Drop statements in drop order.
    pub down: Vec<Statement>,
}

impl MigrationSql {
    /// Check if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }

    /// Tables in creation order.
    pub fn tables(&self) -> Vec<&str> {
        self.up.iter().map(|s| s.table.as_str()).collect()
    }

    /// Tables that have no known definition.
    pub fn undefined_tables(&self) -> Vec<&str> {
        self.up
            .iter()
            .filter(|s| s.kind == StatementKind::Undefined)
            .map(|s| s.table.as_str())
            .collect()
    }

    /// Render the migration as a script.
    pub fn render(&self) -> String {
        let mut out = String::from("-- apply\n");
        for stmt in &self.up {
            out.push_str(&stmt.sql);
            out.push_str("\n\n");
        }
        out.push_str("-- revert\n");
        for stmt in &self.down {
            out.push_str(&stmt.sql);
            out.push('\n');
        }
        out
    }
}

/// DDL generator for one SQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator {
    dialect: SqlDialect,
}

impl SqlGenerator {
    /// Create a generator for a dialect.
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Generate create and drop statements for `tables`.
    ///
    /// The apply section follows [`creation_order`]; the revert section is
    /// its exact reverse.
    pub fn generate<S: AsRef<str>>(&self, tables: &[S], requirements: &RequirementSet) -> MigrationSql {
        let order = creation_order(tables, requirements);

        let up = order
            .iter()
            .map(|table| match requirements.definition(table) {
                Some(def) => Statement {
                    table: table.clone(),
                    kind: StatementKind::Create,
                    sql: self.create_table(def),
                },
                None => Statement {
                    table: table.clone(),
                    kind: StatementKind::Undefined,
                    sql: format!(
                        "-- no schema definition known for {}; create it manually",
                        self.dialect.quote(table)
                    ),
                },
            })
            .collect();

        let down = order
            .iter()
            .rev()
            .map(|table| Statement {
                table: table.clone(),
                kind: StatementKind::Drop,
                sql: self.drop_table(table),
            })
            .collect();

        MigrationSql { up, down }
    }

    /// Generate a `CREATE TABLE IF NOT EXISTS` statement.
    pub fn create_table(&self, def: &TableDefinition) -> String {
        let mut items: Vec<String> = def
            .columns
            .iter()
            .map(|c| {
                if c.definition.is_empty() {
                    self.dialect.quote(&c.name)
                } else {
                    format!("{} {}", self.dialect.quote(&c.name), c.definition)
                }
            })
            .collect();
        items.extend(def.constraints.iter().cloned());

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.dialect.quote(&def.name),
            items.join(",\n    ")
        )
    }

    /// Generate a `DROP TABLE IF EXISTS` statement.
    pub fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {};", self.dialect.quote(name))
    }
}

/// Order `tables` so referenced tables come before the tables referencing
/// them.
///
/// References to tables outside `tables` are ignored. Ready tables keep the
/// order they were given in. Tables caught in a reference cycle are appended
/// in the given order.
pub fn creation_order<S: AsRef<str>>(tables: &[S], requirements: &RequirementSet) -> Vec<String> {
    let mut remaining: Vec<String> = Vec::with_capacity(tables.len());
    for table in tables {
        let table = table.as_ref().to_string();
        if !remaining.contains(&table) {
            remaining.push(table);
        }
    }

    let deps: Vec<Vec<String>> = remaining
        .iter()
        .map(|table| {
            requirements
                .definition(table)
                .map(TableDefinition::references)
                .unwrap_or_default()
                .into_iter()
                .filter(|r| remaining.contains(r))
                .collect()
        })
        .collect();

    let mut pending: Vec<(String, Vec<String>)> = remaining.into_iter().zip(deps).collect();
    let mut order: Vec<String> = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, deps)| deps.iter().all(|d| order.contains(d)));

        if ready.is_empty() {
            let cycle: Vec<String> = blocked.into_iter().map(|(table, _)| table).collect();
            warn!(tables = ?cycle, "Reference cycle between tables, keeping declaration order");
            order.extend(cycle);
            break;
        }

        order.extend(ready.into_iter().map(|(table, _)| table));
        pending = blocked;
    }

    order
}

/// Exact reverse of [`creation_order`].
pub fn drop_order<S: AsRef<str>>(tables: &[S], requirements: &RequirementSet) -> Vec<String> {
    let mut order = creation_order(tables, requirements);
    order.reverse();
    order
}
