//! Content import: sanitize, validate, then persist transactionally.

mod importer;
mod sanitize;
mod validate;

pub use importer::DataImporter;
pub use sanitize::sanitize;
pub use validate::validate_batch;

use crate::error::Error;
use crate::export::{ExportMeta, ExportSnapshot};
use crate::schema::SchemaSpec;
use crate::store::{DatabaseAdapter, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An external snapshot being imported. Same wire shape as
/// [`ExportSnapshot`], but mutable for the duration of one import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBatch {
    /// Snapshot metadata, when the producer supplied it.
    #[serde(default)]
    pub meta: Option<ExportMeta>,
    /// Rows per table.
    pub data: BTreeMap<String, Vec<Row>>,
}

impl From<ExportSnapshot> for ImportBatch {
    fn from(snapshot: ExportSnapshot) -> Self {
        Self {
            meta: Some(snapshot.meta),
            data: snapshot.data,
        }
    }
}

/// Rows diverted during sanitation, per table, surfaced to the caller for
/// reporting.
pub type Problems = BTreeMap<String, Vec<Row>>;

/// Outcome of a successful import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Duplicate rows that were diverted rather than persisted.
    pub problems: Problems,
}

/// Run the full pipeline: sanitize in memory, validate every row, persist
/// in one transaction. Nothing is written unless validation passes in
/// full; nothing stays written unless every persist step succeeds.
pub fn import(
    adapter: &dyn DatabaseAdapter,
    spec: &SchemaSpec,
    batch: ImportBatch,
) -> Result<ImportReport, Error> {
    let (clean, problems) = sanitize(spec, batch);
    validate_batch(spec, &clean)?;
    DataImporter::new(adapter, spec).import(clean)?;
    Ok(ImportReport { problems })
}
