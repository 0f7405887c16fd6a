//! Declarative schema catalog.

mod tables;
mod types;

pub use tables::default_schema;
pub use types::{unique_index_name, ColumnDef, ColumnType, DefaultValue, SchemaSpec, TableDef};
