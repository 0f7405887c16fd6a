//! Versioned JSON snapshots of the database.
//!
//! Snapshots serve two callers: explicit content export, and the full
//! backup taken immediately before a destructive schema migration.

use crate::error::Error;
use crate::schema::SchemaSpec;
use crate::settings::SettingsStore;
use crate::store::{now_millis, DatabaseAdapter, Row};
use crate::util::safe_string;
use crate::versioning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tables that never leave the installation: live secrets and session
/// state.
pub const EXCLUDED_TABLES: &[&str] = &["accesstokens", "refreshtokens", "clients"];

/// Fixed infix of export file names.
const EXPORT_INFIX: &str = "quillpress";

/// Snapshot metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMeta {
    /// Export wall-clock time, epoch milliseconds.
    pub exported_on: i64,
    /// Database version the data was exported at.
    pub version: String,
}

/// A full snapshot: metadata plus every exported table's rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    /// Snapshot metadata.
    pub meta: ExportMeta,
    /// Rows per table. Row order within a table is whatever the underlying
    /// read returned.
    pub data: BTreeMap<String, Vec<Row>>,
}

/// Read every live table except the exclusion list into a snapshot.
/// A failed read on any table aborts the whole export; partial snapshots
/// are never produced.
pub fn export(adapter: &dyn DatabaseAdapter) -> Result<ExportSnapshot, Error> {
    let version = versioning::database_version(adapter)?;
    let mut data = BTreeMap::new();
    for table in adapter.table_names()? {
        if EXCLUDED_TABLES.contains(&table.as_str()) {
            continue;
        }
        let rows = adapter.select_all(&table)?;
        data.insert(table, rows);
    }
    Ok(ExportSnapshot {
        meta: ExportMeta {
            exported_on: now_millis(),
            version: version.to_string(),
        },
        data,
    })
}

/// Export file name: `{safeTitle.}quillpress.{YYYY-MM-DD}.json`. A failed
/// read of the title setting drops the title segment rather than failing
/// the export.
pub fn export_file_name(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> String {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    let title = match SettingsStore::new(adapter, spec).value("title") {
        Ok(Some(title)) => {
            let safe = safe_string(&title);
            if safe.is_empty() {
                String::new()
            } else {
                format!("{safe}.")
            }
        }
        Ok(None) => String::new(),
        Err(err) => {
            warn!(%err, "could not read title setting for export file name");
            String::new()
        }
    };
    format!("{title}{EXPORT_INFIX}.{date}.json")
}

/// Serialize a fresh snapshot to `data_dir` and return the written path.
pub fn write_backup(
    adapter: &dyn DatabaseAdapter,
    spec: &SchemaSpec,
    data_dir: &Path,
) -> Result<PathBuf, Error> {
    let snapshot = export(adapter)?;
    let path = data_dir.join(export_file_name(adapter, spec));
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?)?;
    info!(path = %path.display(), "database backup written");
    Ok(path)
}
