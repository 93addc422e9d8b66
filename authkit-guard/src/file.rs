//! Migration file emission.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::GenerationError;
use crate::sql::MigrationSql;

/// Base name of emitted migration files.
pub const MIGRATION_NAME: &str = "create_authkit_tables";

/// Writes generated migrations into a directory.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    /// Create a writer for a directory. The directory is created on write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the migration to `<timestamp>_create_authkit_tables.sql`.
    ///
    /// A numeric suffix is added when a file with the same timestamp exists.
    pub fn write(&self, migration: &MigrationSql) -> Result<PathBuf, GenerationError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| GenerationError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let now = Utc::now();
        let timestamp = now.format("%Y%m%d%H%M%S");
        let mut path = self.dir.join(format!("{}_{}.sql", timestamp, MIGRATION_NAME));
        let mut n = 1;
        while path.exists() {
            path = self
                .dir
                .join(format!("{}_{}_{}.sql", timestamp, MIGRATION_NAME, n));
            n += 1;
        }

        let mut content = String::from("-- authkit schema migration\n");
        content.push_str(&format!("-- generated at {}\n", now.to_rfc3339()));
        content.push_str(&format!("-- tables: {}\n\n", migration.tables().join(", ")));
        content.push_str(&migration.render());

        std::fs::write(&path, content).map_err(|e| GenerationError::Io {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = %path.display(), tables = migration.up.len(), "Wrote migration file");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use authkit_schema::{FeatureRequirement, RequirementSet, parse_tables};

    use super::*;
    use crate::sql::SqlGenerator;

    fn migration() -> MigrationSql {
        let mut set = RequirementSet::new();
        for def in parse_tables("CREATE TABLE accounts (id INTEGER PRIMARY KEY);").unwrap() {
            set.insert(FeatureRequirement::explicit("base", "accounts_table", def.name.as_str()));
            set.add_definition(def);
        }
        SqlGenerator::default().generate(&set.tables(), &set)
    }

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(tmp.path().join("db").join("migrate"));

        let path = writer.write(&migration()).unwrap();
        assert!(path.starts_with(writer.dir()));

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_create_authkit_tables.sql"));
        assert_eq!(name.split('_').next().unwrap().len(), 14);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- authkit schema migration"));
        assert!(content.contains("-- tables: accounts"));
        assert!(content.contains("CREATE TABLE IF NOT EXISTS \"accounts\""));
        assert!(content.contains("DROP TABLE IF EXISTS \"accounts\";"));
    }

    #[test]
    fn test_same_second_does_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(tmp.path());

        let first = writer.write(&migration()).unwrap();
        let second = writer.write(&migration()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }
}
