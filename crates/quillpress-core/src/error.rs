//! Core error types.

use crate::versioning::DatabaseVersion;
use thiserror::Error;

/// A single schema-shape validation failure, collected during import.
///
/// Issues are aggregated across every row of every table before being
/// reported, so one bad row never hides the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Table the offending row belongs to.
    pub table: String,
    /// Offending property, as `table.column`.
    pub property: String,
    /// The offending value, when one was present.
    pub value: Option<String>,
    /// Human-readable description of the failure.
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Errors produced by the data layer.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more rows failed schema-shape validation. No write has occurred.
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// An expected row is missing.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Unrecoverable cross-reference or translated constraint violation
    /// during import.
    #[error("{message}")]
    DataImport {
        /// Human-readable description.
        message: String,
        /// Offending property, as `table.column`.
        property: String,
        /// The offending value.
        value: String,
    },

    /// The import persist step failed; the transaction was rolled back.
    #[error("import failed with {} error(s)", .0.len())]
    ImportFailed(Vec<Error>),

    /// The persisted database version could not be understood.
    #[error("database version is not recognised: {value:?}")]
    Version {
        /// The raw persisted value.
        value: String,
    },

    /// The database was produced by a newer software version. Fatal: this
    /// build cannot safely operate on it.
    #[error("database version {database} is newer than software version {software}")]
    VersionMismatch {
        /// Version persisted in the database.
        database: DatabaseVersion,
        /// Version baked into the running code.
        software: DatabaseVersion,
    },

    /// The settings table does not exist yet. Signals a fresh install
    /// rather than a corrupt database.
    #[error("settings table does not exist")]
    NotInitialized,

    /// Low-level engine failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure (backup reads/writes).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(resource: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for a [`Error::DataImport`].
    pub fn data_import(
        message: impl Into<String>,
        property: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Error::DataImport {
            message: message.into(),
            property: property.into(),
            value: value.to_string(),
        }
    }
}
