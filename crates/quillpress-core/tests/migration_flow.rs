//! Integration tests for the migration lifecycle.

use quillpress_core::migration::{InitOutcome, MigrationConfig, Migrator};
use quillpress_core::schema::{default_schema, SchemaSpec};
use quillpress_core::settings::SettingsStore;
use quillpress_core::store::{DatabaseAdapter, SqliteAdapter};
use quillpress_core::versioning;
use serde_json::json;
use std::sync::Arc;

struct TestContext {
    adapter: Arc<SqliteAdapter>,
    spec: SchemaSpec,
    data_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            adapter: Arc::new(SqliteAdapter::open_in_memory().unwrap()),
            spec: default_schema(),
            data_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn migrator(&self) -> Migrator {
        Migrator::new(
            self.adapter.clone(),
            self.spec.clone(),
            MigrationConfig::new(self.data_dir.path()),
        )
        .unwrap()
    }

    fn forced_migrator(&self) -> Migrator {
        let mut config = MigrationConfig::new(self.data_dir.path());
        config.force_migration = true;
        Migrator::new(self.adapter.clone(), self.spec.clone(), config).unwrap()
    }

    fn settings(&self) -> SettingsStore<'_> {
        SettingsStore::new(self.adapter.as_ref(), &self.spec)
    }

    fn backup_files(&self) -> Vec<String> {
        std::fs::read_dir(self.data_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

/// The declared schema as it looked at version 003: no explicit tag sort
/// order and no trusted-domain table yet.
fn schema_at_003() -> SchemaSpec {
    let tables = default_schema()
        .tables()
        .iter()
        .filter(|table| table.name != "client_trusted_domains")
        .map(|table| {
            let mut table = table.clone();
            if table.name == "posts_tags" {
                table.columns.retain(|column| column.name != "sort_order");
            }
            table
        })
        .collect();
    SchemaSpec::new(tables)
}

#[test]
fn fresh_install_creates_every_declared_table() {
    let ctx = TestContext::new();

    // no settings table yet: the version probe reports "not initialized"
    assert!(matches!(
        versioning::database_version(ctx.adapter.as_ref()),
        Err(quillpress_core::Error::NotInitialized)
    ));

    let outcome = ctx.migrator().init().unwrap();
    assert_eq!(outcome, InitOutcome::FreshInstall);

    for table in ctx.spec.table_names() {
        assert!(ctx.adapter.has_table(table).unwrap(), "missing {table}");
    }
    assert_eq!(ctx.adapter.select_all("roles").unwrap().len(), 4);
    assert_eq!(ctx.adapter.select_all("users").unwrap().len(), 1);
    assert_eq!(
        versioning::database_version(ctx.adapter.as_ref()).unwrap(),
        versioning::default_database_version().unwrap()
    );
    // nothing existed, so nothing was backed up
    assert!(ctx.backup_files().is_empty());
}

#[test]
fn stale_database_is_backed_up_and_upgraded() {
    let ctx = TestContext::new();

    // build an 003-era database: old schema, old version token
    let old_migrator = Migrator::new(
        ctx.adapter.clone(),
        schema_at_003(),
        MigrationConfig::new(ctx.data_dir.path()),
    )
    .unwrap();
    old_migrator.migrate_up_fresh(false).unwrap();
    ctx.settings().edit("databaseVersion", "003").unwrap();
    // the frontend client arrives with 004
    ctx.adapter
        .delete_where("clients", "slug", &json!("quillpress-frontend"))
        .unwrap();

    let outcome = ctx.migrator().init().unwrap();
    assert_eq!(
        outcome,
        InitOutcome::Migrated {
            from: quillpress_core::DatabaseVersion::new(3),
            to: quillpress_core::DatabaseVersion::new(4),
        }
    );

    // schema diff applied: new table, new column
    assert!(ctx.adapter.has_table("client_trusted_domains").unwrap());
    assert!(ctx
        .adapter
        .column_names("posts_tags")
        .unwrap()
        .contains(&"sort_order".to_string()));

    // versioned fixture step ran
    let clients = ctx
        .adapter
        .select_where("clients", "slug", &json!("quillpress-frontend"))
        .unwrap();
    assert_eq!(clients.len(), 1);
    let foot = ctx.settings().value("site_foot").unwrap().unwrap();
    assert!(foot.contains("jquery"));

    // version persisted, backup written before any of it
    assert_eq!(
        versioning::database_version(ctx.adapter.as_ref()).unwrap(),
        quillpress_core::DatabaseVersion::new(4)
    );
    let backups = ctx.backup_files();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].ends_with(".json"));
}

#[test]
fn up_to_date_database_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.migrator().init().unwrap();

    let posts_before = ctx.adapter.select_all("posts").unwrap().len();
    let outcome = ctx.migrator().init().unwrap();

    assert_eq!(outcome, InitOutcome::UpToDate);
    assert_eq!(ctx.adapter.select_all("posts").unwrap().len(), posts_before);
    assert!(ctx.backup_files().is_empty());
}

#[test]
fn forced_migration_reruns_fixture_steps_idempotently() {
    let ctx = TestContext::new();
    ctx.migrator().init().unwrap();

    let outcome = ctx.forced_migrator().init().unwrap();
    let default = versioning::default_database_version().unwrap();
    assert_eq!(
        outcome,
        InitOutcome::Migrated {
            from: default,
            to: default,
        }
    );

    let posts_first = ctx.adapter.select_all("posts").unwrap().len();
    let clients_first = ctx.adapter.select_all("clients").unwrap().len();

    ctx.forced_migrator().init().unwrap();

    assert_eq!(ctx.adapter.select_all("posts").unwrap().len(), posts_first);
    assert_eq!(ctx.adapter.select_all("clients").unwrap().len(), clients_first);
    assert_eq!(ctx.adapter.select_all("roles").unwrap().len(), 4);
}

#[test]
fn newer_database_refuses_to_run() {
    let ctx = TestContext::new();
    ctx.migrator().init().unwrap();
    ctx.settings().edit("databaseVersion", "017").unwrap();

    let result = ctx.migrator().init();

    assert!(matches!(
        result,
        Err(quillpress_core::Error::VersionMismatch { .. })
    ));
}
