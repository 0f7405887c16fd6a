//! Database schema/data version tracking.
//!
//! The persisted version lives in the settings table under
//! `databaseVersion` (with a legacy `currentVersion` alias from older
//! installations); the default version is baked into the compiled default
//! settings. The orchestrator compares the two to decide whether migration
//! is required.

use crate::error::Error;
use crate::settings::default_setting;
use crate::store::{str_value, DatabaseAdapter};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Settings key holding the persisted version.
pub const DATABASE_VERSION_KEY: &str = "databaseVersion";

/// Legacy settings key used by old installations.
pub const LEGACY_VERSION_KEY: &str = "currentVersion";

/// A database version token, rendered as a three-digit string ("004").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseVersion(u32);

impl DatabaseVersion {
    /// The sentinel version of a database that predates version tracking.
    pub const INITIAL: DatabaseVersion = DatabaseVersion(0);

    /// Build a version from its numeric value.
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// The numeric value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl FromStr for DatabaseVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DatabaseVersion)
            .map_err(|_| Error::Version {
                value: s.to_string(),
            })
    }
}

/// The version baked into the running code.
pub fn default_database_version() -> Result<DatabaseVersion, Error> {
    let default = default_setting(DATABASE_VERSION_KEY)
        .and_then(|s| s.default_value)
        .ok_or_else(|| Error::Version {
            value: String::new(),
        })?;
    default.parse()
}

/// The version persisted in the database.
///
/// Reads every row keyed `databaseVersion` or `currentVersion` and reduces
/// them to the maximum numeric value; no rows (or only empty values) yield
/// [`DatabaseVersion::INITIAL`]. A non-numeric value is an
/// [`Error::Version`]. A missing settings table is the distinct
/// [`Error::NotInitialized`] so callers can tell a fresh install from a
/// corrupt database.
pub fn database_version(adapter: &dyn DatabaseAdapter) -> Result<DatabaseVersion, Error> {
    if !adapter.has_table("settings")? {
        return Err(Error::NotInitialized);
    }

    let mut rows = adapter.select_where("settings", "key", &json!(DATABASE_VERSION_KEY))?;
    rows.extend(adapter.select_where("settings", "key", &json!(LEGACY_VERSION_KEY))?);

    let mut version = DatabaseVersion::INITIAL;
    for row in &rows {
        let value = str_value(row, "value").unwrap_or("");
        if value.trim().is_empty() {
            continue;
        }
        let parsed: DatabaseVersion = value.parse()?;
        version = version.max(parsed);
    }
    Ok(version)
}

/// Overwrite the persisted version with the default version. Called only
/// after a successful migration.
pub fn set_database_version(adapter: &dyn DatabaseAdapter) -> Result<(), Error> {
    let default = default_database_version()?;
    let mut changes = crate::store::Row::new();
    changes.insert("value".into(), json!(default.to_string()));
    let updated = adapter.update_where(
        "settings",
        "key",
        &json!(DATABASE_VERSION_KEY),
        &changes,
    )?;
    if updated == 0 {
        // Legacy databases may only carry the old key; give them the new row.
        let mut row = crate::store::Row::new();
        row.insert("key".into(), json!(DATABASE_VERSION_KEY));
        row.insert("value".into(), json!(default.to_string()));
        row.insert("type".into(), json!("core"));
        if let Some(table) = crate::schema::default_schema().get_table("settings") {
            crate::store::stamp_insert(table, &mut row);
        }
        adapter.insert("settings", &row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_schema;
    use crate::settings::SettingsStore;
    use crate::store::SqliteAdapter;

    fn adapter_with_settings() -> SqliteAdapter {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let spec = default_schema();
        adapter
            .create_table(spec.get_table("settings").unwrap())
            .unwrap();
        adapter
    }

    fn add_version_row(adapter: &SqliteAdapter, key: &str, value: &str) {
        let spec = default_schema();
        let store = SettingsStore::new(adapter, &spec);
        if store.read(key).unwrap().is_some() {
            store.edit(key, value).unwrap();
        } else {
            let mut row = crate::store::Row::new();
            row.insert("key".into(), json!(key));
            row.insert("value".into(), json!(value));
            row.insert("type".into(), json!("core"));
            crate::store::stamp_insert(spec.get_table("settings").unwrap(), &mut row);
            adapter.insert("settings", &row).unwrap();
        }
    }

    #[test]
    fn test_display_zero_pads() {
        assert_eq!(DatabaseVersion::new(4).to_string(), "004");
        assert_eq!(DatabaseVersion::INITIAL.to_string(), "000");
    }

    #[test]
    fn test_missing_settings_table_is_not_initialized() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let result = database_version(&adapter);
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_no_rows_yields_initial() {
        let adapter = adapter_with_settings();
        assert_eq!(database_version(&adapter).unwrap(), DatabaseVersion::INITIAL);
    }

    #[test]
    fn test_legacy_key_and_maximum_win() {
        let adapter = adapter_with_settings();
        add_version_row(&adapter, LEGACY_VERSION_KEY, "002");
        add_version_row(&adapter, DATABASE_VERSION_KEY, "003");

        assert_eq!(database_version(&adapter).unwrap(), DatabaseVersion::new(3));
    }

    #[test]
    fn test_empty_value_is_ignored() {
        let adapter = adapter_with_settings();
        add_version_row(&adapter, DATABASE_VERSION_KEY, "");

        assert_eq!(database_version(&adapter).unwrap(), DatabaseVersion::INITIAL);
    }

    #[test]
    fn test_non_numeric_value_is_version_error() {
        let adapter = adapter_with_settings();
        add_version_row(&adapter, DATABASE_VERSION_KEY, "elderberry");

        assert!(matches!(
            database_version(&adapter),
            Err(Error::Version { .. })
        ));
    }

    #[test]
    fn test_set_database_version_overwrites() {
        let adapter = adapter_with_settings();
        add_version_row(&adapter, DATABASE_VERSION_KEY, "001");

        set_database_version(&adapter).unwrap();

        let expected = default_database_version().unwrap();
        assert_eq!(database_version(&adapter).unwrap(), expected);
    }

    #[test]
    fn test_set_database_version_inserts_when_absent() {
        let adapter = adapter_with_settings();

        set_database_version(&adapter).unwrap();

        let expected = default_database_version().unwrap();
        assert_eq!(database_version(&adapter).unwrap(), expected);
    }
}
