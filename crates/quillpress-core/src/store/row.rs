//! Generic row representation shared by CRUD, fixtures, import and export.

use crate::schema::TableDef;
use serde_json::{Map, Value};

/// A database row as a JSON object: column name to value.
pub type Row = Map<String, Value>;

/// Build a row from `(key, value)` pairs.
pub fn row_from(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// String value of a column, if present and textual.
pub fn str_value<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Integer value of a column. Accepts JSON numbers and numeric strings,
/// since snapshots produced by other installations are not strict about
/// id types.
pub fn int_value(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether the column is absent, null, or an empty string.
pub fn is_blank(row: &Row, key: &str) -> bool {
    match row.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fill in the bookkeeping columns an internal insert is expected to carry:
/// `uuid` (when the table declares one), `created_at`, and `created_by`
/// (the system actor, user id 1). Values already present are left alone.
pub fn stamp_insert(table: &TableDef, row: &mut Row) {
    if table.has_column("uuid") && is_blank(row, "uuid") {
        row.insert("uuid".into(), Value::from(uuid::Uuid::new_v4().to_string()));
    }
    if table.has_column("created_at") && is_blank(row, "created_at") {
        row.insert("created_at".into(), Value::from(now_millis()));
    }
    if table.has_column("created_by") && is_blank(row, "created_by") {
        row.insert("created_by".into(), Value::from(1));
    }
}
