//! Key/value settings rows and their compiled-in defaults.
//!
//! Every setting is one row in the `settings` table; the surrounding code
//! treats them as a flat key → value mapping with a category `type`.

mod defaults;

pub use defaults::{default_setting, DefaultSetting, DEFAULT_SETTINGS};

use crate::error::Error;
use crate::schema::SchemaSpec;
use crate::store::{find_one, stamp_insert, str_value, DatabaseAdapter, Row};
use serde_json::{json, Value};
use tracing::debug;

/// Settings access over the generic row CRUD.
pub struct SettingsStore<'a> {
    adapter: &'a dyn DatabaseAdapter,
    spec: &'a SchemaSpec,
}

impl<'a> SettingsStore<'a> {
    /// Create a store over an adapter and the declared schema.
    pub fn new(adapter: &'a dyn DatabaseAdapter, spec: &'a SchemaSpec) -> Self {
        Self { adapter, spec }
    }

    /// The full row for a key, if present.
    pub fn read(&self, key: &str) -> Result<Option<Row>, Error> {
        find_one(self.adapter, "settings", "key", &json!(key))
    }

    /// The value for a key, if the row exists and the value is non-null.
    pub fn value(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self
            .read(key)?
            .and_then(|row| str_value(&row, "value").map(String::from)))
    }

    /// Insert a new setting row. The category comes from the defaults table
    /// when the key is known, `core` otherwise.
    pub fn add(&self, key: &str, value: Option<&str>) -> Result<(), Error> {
        let setting_type = default_setting(key).map(|s| s.setting_type).unwrap_or("core");
        let mut row = Row::new();
        row.insert("key".into(), json!(key));
        row.insert(
            "value".into(),
            value.map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("type".into(), json!(setting_type));
        if let Some(table) = self.spec.get_table("settings") {
            stamp_insert(table, &mut row);
        }
        self.adapter.insert("settings", &row)?;
        Ok(())
    }

    /// Update the value of an existing setting. Missing key is a
    /// [`Error::NotFound`].
    pub fn edit(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut changes = Row::new();
        changes.insert("value".into(), json!(value));
        self.update_fields(key, changes)
    }

    /// Apply arbitrary column changes to an existing setting row.
    pub fn update_fields(&self, key: &str, changes: Row) -> Result<(), Error> {
        let updated = self
            .adapter
            .update_where("settings", "key", &json!(key), &changes)?;
        if updated == 0 {
            return Err(Error::not_found(format!("setting {key:?}")));
        }
        Ok(())
    }

    /// Insert any default setting that has no row yet. Existing rows are
    /// never touched.
    pub fn populate_defaults(&self) -> Result<(), Error> {
        for default in DEFAULT_SETTINGS {
            if self.read(default.key)?.is_none() {
                debug!(key = default.key, "inserting missing default setting");
                self.add(default.key, default.default_value)?;
            }
        }
        Ok(())
    }
}
