//! Schema diffing into migration commands.
//!
//! The generators are pure: they compare the declared schema against an
//! introspected shape and return commands for [`run_commands`] to execute
//! later. Column evolution is additive-only; existing columns are never
//! dropped or altered.

use crate::error::Error;
use crate::schema::{unique_index_name, SchemaSpec};
use crate::store::DatabaseAdapter;
use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// One deferred schema change, carrying enough context to execute exactly
/// once and to be logged beforehand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationCommand {
    /// Create a declared table.
    CreateTable {
        /// Table to create.
        table: String,
    },
    /// Drop a table that is no longer declared.
    DropTable {
        /// Table to drop.
        table: String,
    },
    /// Add a declared column missing from the live table.
    AddColumn {
        /// Table owning the column.
        table: String,
        /// Column to add.
        column: String,
    },
    /// Create the conventional unique index on a column.
    AddUnique {
        /// Table owning the column.
        table: String,
        /// Column to make unique.
        column: String,
    },
    /// Drop the conventional unique index from a column.
    DropUnique {
        /// Table owning the column.
        table: String,
        /// Column to release.
        column: String,
    },
}

impl fmt::Display for MigrationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationCommand::CreateTable { table } => write!(f, "creating table: {table}"),
            MigrationCommand::DropTable { table } => write!(f, "deleting table: {table}"),
            MigrationCommand::AddColumn { table, column } => {
                write!(f, "adding column: {table}.{column}")
            }
            MigrationCommand::AddUnique { table, column } => {
                write!(f, "adding unique on: {table}.{column}")
            }
            MigrationCommand::DropUnique { table, column } => {
                write!(f, "dropping unique on: {table}.{column}")
            }
        }
    }
}

/// One [`MigrationCommand::DropTable`] per table present in `old_tables`
/// but absent from `new_tables`.
pub fn delete_table_commands(old_tables: &[String], new_tables: &[&str]) -> Vec<MigrationCommand> {
    let keep: HashSet<&str> = new_tables.iter().copied().collect();
    old_tables
        .iter()
        .filter(|t| !keep.contains(t.as_str()))
        .map(|t| MigrationCommand::DropTable { table: t.clone() })
        .collect()
}

/// One [`MigrationCommand::CreateTable`] per declared table missing from
/// `old_tables`.
pub fn add_table_commands(old_tables: &[String], new_tables: &[&str]) -> Vec<MigrationCommand> {
    let existing: HashSet<&str> = old_tables.iter().map(String::as_str).collect();
    new_tables
        .iter()
        .filter(|t| !existing.contains(**t))
        .map(|t| MigrationCommand::CreateTable {
            table: (*t).to_string(),
        })
        .collect()
}

/// One [`MigrationCommand::AddColumn`] per declared column of `table`
/// missing from `existing_columns`. Unknown tables produce nothing.
pub fn add_column_commands(
    spec: &SchemaSpec,
    table: &str,
    existing_columns: &[String],
) -> Vec<MigrationCommand> {
    let existing: HashSet<&str> = existing_columns.iter().map(String::as_str).collect();
    let Some(table_def) = spec.get_table(table) else {
        return Vec::new();
    };
    table_def
        .columns
        .iter()
        .filter(|c| !existing.contains(c.name.as_str()))
        .map(|c| MigrationCommand::AddColumn {
            table: table.to_string(),
            column: c.name.clone(),
        })
        .collect()
}

/// Reconcile each declared column's `unique` flag against the presence of
/// its conventionally-named index in `existing_indexes`.
pub fn modify_unique_commands(
    spec: &SchemaSpec,
    table: &str,
    existing_indexes: &[String],
) -> Vec<MigrationCommand> {
    let indexes: HashSet<&str> = existing_indexes.iter().map(String::as_str).collect();
    let Some(table_def) = spec.get_table(table) else {
        return Vec::new();
    };
    let mut commands = Vec::new();
    for column in &table_def.columns {
        let index = unique_index_name(table, &column.name);
        let present = indexes.contains(index.as_str());
        if column.unique && !present {
            commands.push(MigrationCommand::AddUnique {
                table: table.to_string(),
                column: column.name.clone(),
            });
        } else if !column.unique && present {
            commands.push(MigrationCommand::DropUnique {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
    }
    commands
}

/// Execute commands strictly sequentially, logging each before it runs.
/// Later commands may depend on tables or columns created earlier in the
/// same run, so failures abort immediately.
pub fn run_commands(
    adapter: &dyn DatabaseAdapter,
    spec: &SchemaSpec,
    commands: &[MigrationCommand],
) -> Result<(), Error> {
    for command in commands {
        info!(%command, "running migration command");
        match command {
            MigrationCommand::CreateTable { table } => {
                let def = spec
                    .get_table(table)
                    .ok_or_else(|| Error::not_found(format!("declared table {table}")))?;
                adapter.create_table(def)?;
            }
            MigrationCommand::DropTable { table } => adapter.drop_table_if_exists(table)?,
            MigrationCommand::AddColumn { table, column } => {
                let def = spec
                    .get_table(table)
                    .and_then(|t| t.get_column(column))
                    .ok_or_else(|| {
                        Error::not_found(format!("declared column {table}.{column}"))
                    })?;
                adapter.add_column(table, def)?;
            }
            MigrationCommand::AddUnique { table, column } => adapter.add_unique(table, column)?,
            MigrationCommand::DropUnique { table, column } => {
                adapter.drop_unique(table, column)?
            }
        }
    }
    Ok(())
}
