//! Schema migration: command generation and orchestration.

mod commands;
mod executor;

pub use commands::{
    add_column_commands, add_table_commands, delete_table_commands, modify_unique_commands,
    run_commands, MigrationCommand,
};
pub use executor::{InitOutcome, MigrationConfig, Migrator};
