//! Properties that must hold for every feature set.

use std::sync::Arc;

use parking_lot::Mutex;

use authkit::guard::{DiagnosticListener, creation_order, drop_order};
use authkit::prelude::*;
use authkit::schema::{builtin, discover};
use authkit::sqlite::SqliteHandle;
use pretty_assertions::assert_eq;

/// Records every statement the database handle reports as failed.
#[derive(Default)]
struct Recorder {
    errors: Mutex<Vec<String>>,
}

impl DiagnosticListener for Recorder {
    fn on_error(&self, sql: &str, _message: &str) {
        self.errors.lock().push(sql.to_string());
    }
}

fn all_features() -> FeatureRegistry {
    FeatureRegistry::builtin(&builtin::names(), &TemplateContext::default()).expect("catalog")
}

fn dev_guard(generation: GenerationMode) -> (SchemaGuard, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let guard = SchemaGuard::new(
        GuardConfig::new()
            .registry(all_features())
            .generation(generation)
            .environment(EnvironmentSource::tag("development"))
            .logger(sink.clone()),
    );
    (guard, sink)
}

#[test]
fn test_discovery_is_union_of_explicit_and_hidden() {
    let ctx = TemplateContext::default();
    let registry = all_features();
    let requirements = discover(&registry, &ctx);

    let mut expected: Vec<String> = Vec::new();
    for feature in registry.features() {
        for table in feature.required_tables() {
            expected.push(table.table);
        }
        if let Some(template) = feature.schema_template() {
            let rendered = ctx.render(feature.name(), template).expect("render");
            expected.extend(authkit::schema::created_tables(&rendered).expect("parse"));
        }
    }
    expected.sort();
    expected.dedup();

    assert_eq!(requirements.sorted_tables(), expected);
}

#[test]
fn test_drop_order_reverses_creation_order() {
    let (guard, _) = dev_guard(GenerationMode::None);
    let requirements = guard.requirements();
    let tables = requirements.tables();

    let mut create = creation_order(&tables, requirements);
    let drop = drop_order(&tables, requirements);
    create.reverse();
    assert_eq!(drop, create);

    let position = |name: &str| drop.iter().position(|t| t == name).expect("present");
    assert_eq!(drop.last().map(String::as_str), Some("accounts"));
    assert!(position("account_webauthn_keys") < position("accounts"));
}

#[test]
fn test_existence_check_never_reports_missing_tables() {
    let recorder = Arc::new(Recorder::default());
    let db = SqliteHandle::open_in_memory()
        .expect("in-memory database")
        .with_listener(recorder.clone());
    let (guard, _) = dev_guard(GenerationMode::None);

    let missing = guard.missing_tables(&db);
    assert_eq!(missing.len(), guard.requirements().len());
    assert!(guard.table_status(&db).iter().all(|s| !s.exists));

    assert!(recorder.errors.lock().is_empty());
    assert_eq!(db.listener_count(), 1);

    db.execute("SELECT * FROM account_otp_keys").unwrap_err();
    assert_eq!(recorder.errors.lock().len(), 1);
}

#[test]
fn test_create_is_idempotent() {
    let (guard, _) = dev_guard(GenerationMode::Create);
    let db = SqliteHandle::open_in_memory().expect("in-memory database");

    let first = guard.check(&db).expect("first run");
    let first = first.synthesis.expect("first run synthesizes");
    assert_eq!(first.created.len(), guard.requirements().len());
    assert!(first.converged());

    let second = guard.check(&db).expect("second run");
    assert!(second.missing.is_empty());
    assert!(second.synthesis.is_none());

    let rerun = guard.generate(&db).expect("explicit rerun");
    assert!(rerun.created.is_empty());
    assert!(rerun.converged());
}

#[test]
fn test_destructive_modes_refused_outside_development() {
    for mode in [GenerationMode::Sync, GenerationMode::Recreate] {
        for env in ["production", "staging"] {
            let sink = Arc::new(MemorySink::new());
            let guard = SchemaGuard::new(
                GuardConfig::new()
                    .registry(all_features())
                    .environment(EnvironmentSource::tag(env))
                    .logger(sink.clone()),
            );
            let db = SqliteHandle::open_in_memory().expect("in-memory database");

            let report = guard.generate_with(&mode, &db).expect("refusal is reported");
            assert!(report.refused, "{} in {}", mode.name(), env);
            assert!(report.created.is_empty());
            assert!(report.dropped.is_empty());
            assert_eq!(sink.count(Severity::Error), 1);
            assert_eq!(guard.missing_tables(&db).len(), guard.requirements().len());
        }
    }
}

#[test]
fn test_recreate_in_development_rebuilds_everything() {
    let (guard, _) = dev_guard(GenerationMode::Recreate);
    let db = SqliteHandle::open_in_memory().expect("in-memory database");
    guard.generate_with(&GenerationMode::Create, &db).expect("create");
    db.execute("INSERT INTO accounts (id, email) VALUES (1, 'a@example.com')")
        .expect("seed account");

    let report = guard.check(&db).expect("recreate");
    let synthesis = report.synthesis.expect("recreate always runs");

    assert_eq!(synthesis.dropped.len(), guard.requirements().len());
    assert_eq!(synthesis.created.len(), guard.requirements().len());
    assert!(synthesis.converged());

    let rows: i64 = db.with_connection(|conn| {
        conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .expect("count rows")
    });
    assert_eq!(rows, 0);
}
