//! Column, table, and schema definitions.
//!
//! The schema spec is the declarative source of truth for the database
//! shape the running software expects. It is compiled into the program and
//! never mutated at runtime; migration diffs it against the introspected
//! shape of the live database.

/// Data type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer primary key.
    Increments,
    /// Integer.
    Integer,
    /// Large integer (epoch-millisecond expiries and the like).
    BigInteger,
    /// Boolean.
    Bool,
    /// Date-time, stored as epoch milliseconds.
    DateTime,
    /// Variable-length string with a maximum length.
    String {
        /// Maximum length in characters, enforced by validation.
        maxlength: usize,
    },
    /// Unbounded text.
    Text,
    /// Large text (post bodies, rendered HTML).
    MediumText,
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Int(i64),
    /// Text default.
    Text(&'static str),
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub col_type: ColumnType,
    /// Whether NULL is allowed. Columns are non-nullable unless opted in.
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    pub primary: bool,
    /// Whether a conventionally-named unique index is wanted on this column.
    pub unique: bool,
    /// Whether the column is unsigned (advisory; not all engines care).
    pub unsigned: bool,
    /// Foreign key target as `table.column`, if any.
    pub references: Option<String>,
    /// Default value applied by the engine on insert, if any.
    pub default_value: Option<DefaultValue>,
}

impl ColumnDef {
    /// Create a new non-nullable column.
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            nullable: false,
            primary: false,
            unique: false,
            unsigned: false,
            references: None,
            default_value: None,
        }
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Request a unique index on this column.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as unsigned.
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Declare a foreign key target (`table.column`).
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.references = Some(target.into());
        self
    }

    /// Set the engine-side default value.
    pub fn default_to(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Whether a value for this column must be supplied on insert: it is
    /// non-nullable and the engine will not fill it in.
    pub fn is_required(&self) -> bool {
        !self.nullable
            && self.default_value.is_none()
            && !matches!(self.col_type, ColumnType::Increments)
    }

    /// The conventional name of this column's unique index on `table`.
    pub fn unique_index_name(&self, table: &str) -> String {
        unique_index_name(table, &self.name)
    }
}

/// The conventional unique index name for `table.column`.
pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_unique")
}

/// A table definition: an ordered list of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Look up a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with this name is declared.
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns declared unique.
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.unique)
    }
}

/// The full declared schema: tables in declaration order.
///
/// Declaration order matters: tables are created in this order on a fresh
/// install and dropped in reverse order on reset, so referenced tables must
/// be declared before the tables that reference them.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSpec {
    tables: Vec<TableDef>,
}

impl SchemaSpec {
    /// Build a spec from a list of tables.
    pub fn new(tables: Vec<TableDef>) -> Self {
        let spec = Self { tables };
        debug_assert!(spec.dangling_references().is_empty());
        spec
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Table names in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Look up a table by name.
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Whether a table with this name is declared.
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Foreign key targets that name a table missing from the spec.
    /// Must be empty for a well-formed spec.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut dangling = Vec::new();
        for table in &self.tables {
            for column in &table.columns {
                if let Some(target) = &column.references {
                    let target_table = target.split('.').next().unwrap_or(target);
                    if !self.has_table(target_table) {
                        dangling.push(format!("{}.{} -> {}", table.name, column.name, target));
                    }
                }
            }
        }
        dangling
    }
}
