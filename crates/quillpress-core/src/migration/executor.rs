//! Migration orchestrator.
//!
//! Sequences introspection, command generation, fixtures, and versioning
//! into one of three flows: fresh install, incremental upgrade, or
//! up-to-date no-op. A database newer than the software is fatal.

use super::commands::{
    add_column_commands, add_table_commands, delete_table_commands, modify_unique_commands,
    run_commands, MigrationCommand,
};
use crate::error::Error;
use crate::export;
use crate::fixtures;
use crate::schema::SchemaSpec;
use crate::settings::SettingsStore;
use crate::store::DatabaseAdapter;
use crate::versioning::{self, DatabaseVersion};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Migration configuration, owned by the orchestrator. No ambient state:
/// the environment is read once, here, by the caller's choice.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory receiving pre-migration JSON backups.
    pub data_dir: PathBuf,
    /// Re-run versioned fixture steps even when the versions match.
    /// Development/test re-seeding escape hatch.
    pub force_migration: bool,
}

impl MigrationConfig {
    /// Configuration with the force override off.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            force_migration: false,
        }
    }

    /// Configuration with the force override taken from the
    /// `FORCE_MIGRATION` environment variable.
    pub fn from_env(data_dir: impl Into<PathBuf>) -> Self {
        let force_migration = std::env::var("FORCE_MIGRATION")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self {
            data_dir: data_dir.into(),
            force_migration,
        }
    }
}

/// What `init` decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// No database existed; every table was created and seeded.
    FreshInstall,
    /// The schema was migrated between the two versions.
    Migrated {
        /// Version found in the database.
        from: DatabaseVersion,
        /// Version migrated to.
        to: DatabaseVersion,
    },
    /// Nothing to do.
    UpToDate,
}

/// Orchestrates the whole migration lifecycle over one adapter.
pub struct Migrator {
    adapter: Arc<dyn DatabaseAdapter>,
    spec: SchemaSpec,
    config: MigrationConfig,
    // computed once; the default settings never change at runtime
    default_version: DatabaseVersion,
}

impl Migrator {
    /// Create a migrator. Fails if the compiled default version is
    /// malformed.
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        spec: SchemaSpec,
        config: MigrationConfig,
    ) -> Result<Self, Error> {
        let default_version = versioning::default_database_version()?;
        Ok(Self {
            adapter,
            spec,
            config,
            default_version,
        })
    }

    /// The version this software migrates databases to.
    pub fn default_version(&self) -> DatabaseVersion {
        self.default_version
    }

    /// Decide and run the appropriate flow. Call exactly once at startup.
    ///
    /// There are four possibilities:
    /// 1. the database exists and is up to date;
    /// 2. the database exists but is out of date;
    /// 3. the database is newer than the software (fatal);
    /// 4. the database has not been created yet.
    pub fn init(&self) -> Result<InitOutcome, Error> {
        let adapter = self.adapter.as_ref();
        match versioning::database_version(adapter) {
            Err(Error::NotInitialized) => {
                info!(
                    version = %self.default_version,
                    "database initialisation required"
                );
                self.migrate_up_fresh(false)?;
                Ok(InitOutcome::FreshInstall)
            }
            Err(err) => Err(err),
            Ok(database) => {
                if database < self.default_version || self.config.force_migration {
                    info!(
                        from = %database,
                        to = %self.default_version,
                        "database upgrade required"
                    );
                    self.migrate_up(database, self.default_version)?;
                    versioning::set_database_version(adapter)?;
                    Ok(InitOutcome::Migrated {
                        from: database,
                        to: self.default_version,
                    })
                } else if database == self.default_version {
                    info!(version = %database, "database up to date");
                    // forward-compatible data-quality patch; never fails boot
                    if let Err(err) = fixtures::fix_client_secret(adapter) {
                        warn!(%err, "client secret fixup failed");
                    }
                    Ok(InitOutcome::UpToDate)
                } else {
                    error!(
                        database = %database,
                        software = %self.default_version,
                        "database is not compatible with this software version"
                    );
                    Err(Error::VersionMismatch {
                        database,
                        software: self.default_version,
                    })
                }
            }
        }
    }

    /// Create every declared table in declaration order, then (unless
    /// `tables_only`) seed fixtures and default settings. Nothing exists
    /// yet, so no backup is taken.
    pub fn migrate_up_fresh(&self, tables_only: bool) -> Result<(), Error> {
        let adapter = self.adapter.as_ref();
        info!("creating tables");
        let creates: Vec<MigrationCommand> = self
            .spec
            .table_names()
            .iter()
            .map(|t| MigrationCommand::CreateTable {
                table: (*t).to_string(),
            })
            .collect();
        run_commands(adapter, &self.spec, &creates)?;

        if tables_only {
            return Ok(());
        }
        fixtures::populate(adapter, &self.spec)?;
        info!("populating default settings");
        SettingsStore::new(adapter, &self.spec).populate_defaults()
    }

    /// Migrate an out-of-date database up to the default version.
    ///
    /// A full backup is taken first; without a successful backup no
    /// destructive step runs. Commands execute strictly in the fixed
    /// order: table drops, table creates, column adds, unique changes.
    pub fn migrate_up(&self, from: DatabaseVersion, to: DatabaseVersion) -> Result<(), Error> {
        let adapter = self.adapter.as_ref();

        info!("creating database backup");
        export::write_backup(adapter, &self.spec, &self.config.data_dir)?;

        let old_tables = adapter.table_names()?;
        let new_tables = self.spec.table_names();

        let mut migrate_ops = delete_table_commands(&old_tables, &new_tables);
        migrate_ops.extend(add_table_commands(&old_tables, &new_tables));

        let mut unique_ops = Vec::new();
        for table in &old_tables {
            let indexes = adapter.index_names(table)?;
            unique_ops.extend(modify_unique_commands(&self.spec, table, &indexes));
        }
        for table in &old_tables {
            let columns = adapter.column_names(table)?;
            migrate_ops.extend(add_column_commands(&self.spec, table, &columns));
        }
        migrate_ops.extend(unique_ops);

        if !migrate_ops.is_empty() {
            info!("running migrations");
            run_commands(adapter, &self.spec, &migrate_ops)?;
        }

        // current defaults are fixtures too; insert any missing before the
        // versioned steps read them
        info!("populating default settings");
        SettingsStore::new(adapter, &self.spec).populate_defaults()?;

        fixtures::update(adapter, &self.spec, from, to, self.config.force_migration)
    }

    /// Drop every declared table in reverse declaration order.
    pub fn reset(&self) -> Result<(), Error> {
        let adapter = self.adapter.as_ref();
        for table in self.spec.table_names().iter().rev() {
            info!(table, "dropping table");
            adapter.drop_table_if_exists(table)?;
        }
        Ok(())
    }
}
