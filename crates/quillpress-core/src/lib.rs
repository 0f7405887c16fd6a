//! Quillpress Core - schema catalog, migration engine, fixtures, and
//! content import/export.
//!
//! This crate is the data layer of the Quillpress blogging platform. The
//! declared schema ([`schema`]) is diffed against the live database shape
//! ([`store`] introspection) to produce migration commands; the
//! orchestrator ([`migration::Migrator`]) sequences backups, DDL, fixture
//! seeding and versioned fixture upgrades; [`export`] and [`import`] move
//! content between installations as versioned JSON snapshots.

pub mod error;
pub mod export;
pub mod fixtures;
pub mod import;
pub mod migration;
pub mod schema;
pub mod settings;
pub mod store;
pub mod util;
pub mod versioning;

pub use error::{Error, ValidationIssue};
pub use export::{export, export_file_name, write_backup, ExportMeta, ExportSnapshot};
pub use import::{import, DataImporter, ImportBatch, ImportReport, Problems};
pub use migration::{InitOutcome, MigrationCommand, MigrationConfig, Migrator};
pub use schema::{default_schema, ColumnDef, ColumnType, SchemaSpec, TableDef};
pub use settings::{SettingsStore, DEFAULT_SETTINGS};
pub use store::{DatabaseAdapter, Row, SqliteAdapter};
pub use versioning::DatabaseVersion;
