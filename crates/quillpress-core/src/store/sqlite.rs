//! SQLite implementation of [`DatabaseAdapter`] over rusqlite.

use super::adapter::DatabaseAdapter;
use super::row::Row;
use crate::error::Error;
use crate::schema::{unique_index_name, ColumnDef, ColumnType, DefaultValue, TableDef};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed adapter. All access is serialized on one connection.
pub struct SqliteAdapter {
    conn: Mutex<Connection>,
}

impl SqliteAdapter {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn type_sql(col_type: &ColumnType) -> String {
    match col_type {
        ColumnType::Increments => "INTEGER".into(),
        ColumnType::Integer => "INTEGER".into(),
        ColumnType::BigInteger => "BIGINT".into(),
        ColumnType::Bool => "BOOLEAN".into(),
        ColumnType::DateTime => "DATETIME".into(),
        ColumnType::String { maxlength } => format!("VARCHAR({maxlength})"),
        ColumnType::Text => "TEXT".into(),
        ColumnType::MediumText => "MEDIUMTEXT".into(),
    }
}

fn default_sql(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Bool(b) => (if *b { "1" } else { "0" }).into(),
        DefaultValue::Int(n) => n.to_string(),
        DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

// UNIQUE is deliberately absent here: uniqueness is expressed as a named
// index ({table}_{column}_unique) so migration can introspect and toggle it.
fn column_sql(column: &ColumnDef) -> String {
    let mut sql = format!("\"{}\" {}", column.name, type_sql(&column.col_type));
    if matches!(column.col_type, ColumnType::Increments) {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT NOT NULL");
        return sql;
    }
    if column.primary {
        sql.push_str(" PRIMARY KEY");
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        sql.push_str(&format!(" DEFAULT {}", default_sql(default)));
    }
    if let Some(target) = &column.references {
        if let Some((table, col)) = target.split_once('.') {
            sql.push_str(&format!(" REFERENCES \"{table}\" (\"{col}\")"));
        }
    }
    sql
}

fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        // Nested structures are stored as their JSON text.
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(hex::encode(b)),
    }
}

fn read_rows(conn: &Connection, sql: &str, params: &[rusqlite::types::Value]) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (idx, name) in names.iter().enumerate() {
            map.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
        }
        out.push(map);
    }
    Ok(out)
}

impl DatabaseAdapter for SqliteAdapter {
    fn has_table(&self, table: &str) -> Result<bool, Error> {
        let count: i64 = self.conn().query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn table_names(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn index_names(&self, table: &str) -> Result<Vec<String>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("PRAGMA index_list(\"{table}\")"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn create_table(&self, table: &TableDef) -> Result<(), Error> {
        let columns: Vec<String> = table.columns.iter().map(column_sql).collect();
        let sql = format!("CREATE TABLE \"{}\" ({})", table.name, columns.join(", "));
        self.conn().execute(&sql, [])?;
        for column in table.unique_columns() {
            self.add_unique(&table.name, &column.name)?;
        }
        Ok(())
    }

    fn drop_table_if_exists(&self, table: &str) -> Result<(), Error> {
        self.conn()
            .execute(&format!("DROP TABLE IF EXISTS \"{table}\""), [])?;
        Ok(())
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), Error> {
        self.conn().execute(
            &format!("ALTER TABLE \"{table}\" ADD COLUMN {}", column_sql(column)),
            [],
        )?;
        Ok(())
    }

    fn add_unique(&self, table: &str, column: &str) -> Result<(), Error> {
        let index = unique_index_name(table, column);
        self.conn().execute(
            &format!("CREATE UNIQUE INDEX \"{index}\" ON \"{table}\" (\"{column}\")"),
            [],
        )?;
        Ok(())
    }

    fn drop_unique(&self, table: &str, column: &str) -> Result<(), Error> {
        let index = unique_index_name(table, column);
        self.conn().execute(&format!("DROP INDEX \"{index}\""), [])?;
        Ok(())
    }

    fn select_all(&self, table: &str) -> Result<Vec<Row>, Error> {
        read_rows(&self.conn(), &format!("SELECT * FROM \"{table}\""), &[])
    }

    fn select_where(&self, table: &str, column: &str, value: &Value) -> Result<Vec<Row>, Error> {
        read_rows(
            &self.conn(),
            &format!("SELECT * FROM \"{table}\" WHERE \"{column}\" = ?1"),
            &[json_to_sql(value)],
        )
    }

    fn insert(&self, table: &str, row: &Row) -> Result<i64, Error> {
        let columns: Vec<String> = row.keys().map(|k| format!("\"{k}\"")).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
        let params: Vec<rusqlite::types::Value> = row.values().map(json_to_sql).collect();
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        let conn = self.conn();
        conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    fn update_where(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        changes: &Row,
    ) -> Result<usize, Error> {
        if changes.is_empty() {
            return Ok(0);
        }
        let assignments: Vec<String> = changes
            .keys()
            .enumerate()
            .map(|(i, k)| format!("\"{k}\" = ?{}", i + 1))
            .collect();
        let mut params: Vec<rusqlite::types::Value> = changes.values().map(json_to_sql).collect();
        params.push(json_to_sql(key));
        let sql = format!(
            "UPDATE \"{table}\" SET {} WHERE \"{key_column}\" = ?{}",
            assignments.join(", "),
            params.len()
        );
        let updated = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(updated)
    }

    fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<usize, Error> {
        let deleted = self.conn().execute(
            &format!("DELETE FROM \"{table}\" WHERE \"{column}\" = ?1"),
            [json_to_sql(value)],
        )?;
        Ok(deleted)
    }

    fn delete_all(&self, table: &str) -> Result<usize, Error> {
        let deleted = self.conn().execute(&format!("DELETE FROM \"{table}\""), [])?;
        Ok(deleted)
    }

    fn begin(&self) -> Result<(), Error> {
        self.conn().execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), Error> {
        self.conn().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        self.conn().execute_batch("ROLLBACK")?;
        Ok(())
    }
}
