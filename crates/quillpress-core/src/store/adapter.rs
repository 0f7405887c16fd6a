//! The database adapter seam.
//!
//! Fixtures, migration, import, and export all talk to the database through
//! this one trait: introspection, DDL, generic row CRUD, and transaction
//! control. One implementation exists per database engine.

use super::row::Row;
use crate::error::Error;
use crate::schema::{ColumnDef, TableDef};
use serde_json::Value;

/// Engine-agnostic database access.
pub trait DatabaseAdapter: Send + Sync {
    /// Whether a table with this name exists.
    fn has_table(&self, table: &str) -> Result<bool, Error>;

    /// Names of all user tables.
    fn table_names(&self) -> Result<Vec<String>, Error>;

    /// Column names of a table.
    fn column_names(&self, table: &str) -> Result<Vec<String>, Error>;

    /// Index names on a table.
    fn index_names(&self, table: &str) -> Result<Vec<String>, Error>;

    /// Create a table from its declared definition, including unique
    /// indexes for columns declared unique.
    fn create_table(&self, table: &TableDef) -> Result<(), Error>;

    /// Drop a table if it exists.
    fn drop_table_if_exists(&self, table: &str) -> Result<(), Error>;

    /// Add a declared column to an existing table.
    fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), Error>;

    /// Create the conventionally-named unique index for `table.column`.
    fn add_unique(&self, table: &str, column: &str) -> Result<(), Error>;

    /// Drop the conventionally-named unique index for `table.column`.
    fn drop_unique(&self, table: &str, column: &str) -> Result<(), Error>;

    /// All rows of a table.
    fn select_all(&self, table: &str) -> Result<Vec<Row>, Error>;

    /// Rows where `column = value`.
    fn select_where(&self, table: &str, column: &str, value: &Value) -> Result<Vec<Row>, Error>;

    /// Insert a row; returns the new row id.
    fn insert(&self, table: &str, row: &Row) -> Result<i64, Error>;

    /// Apply `changes` to every row where `key_column = key`; returns the
    /// number of rows updated.
    fn update_where(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        changes: &Row,
    ) -> Result<usize, Error>;

    /// Delete rows where `column = value`; returns the number deleted.
    fn delete_where(&self, table: &str, column: &str, value: &Value) -> Result<usize, Error>;

    /// Delete every row of a table; returns the number deleted.
    fn delete_all(&self, table: &str) -> Result<usize, Error>;

    /// Begin a transaction. Nested transactions are not supported.
    fn begin(&self) -> Result<(), Error>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<(), Error>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<(), Error>;
}

/// First row where `column = value`, if any.
pub fn find_one(
    adapter: &dyn DatabaseAdapter,
    table: &str,
    column: &str,
    value: &Value,
) -> Result<Option<Row>, Error> {
    Ok(adapter.select_where(table, column, value)?.into_iter().next())
}
