//! In-memory sanitation of an import batch.
//!
//! No database access happens here: rows are repaired (uuids), duplicates
//! are diverted into the problems bucket, and relationship rows pointing at
//! duplicate tags are rewritten to the surviving tag.

use super::{ImportBatch, Problems};
use crate::schema::SchemaSpec;
use crate::store::{int_value, str_value, Row};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Posts and tags are scanned before everything else so that duplicate
/// decisions exist by the time relationship tables are processed.
fn table_priority(table: &str) -> u8 {
    match table {
        "posts" => 1,
        "tags" => 2,
        _ => 3,
    }
}

fn attribute(row: &Row, key: &str) -> Value {
    row.get(key).cloned().unwrap_or(Value::Null)
}

/// An earlier-accepted row with identical values for every key attribute.
fn find_duplicate<'a>(accepted: &'a [Row], candidate: &Row, attribs: &[&str]) -> Option<&'a Row> {
    accepted.iter().find(|row| {
        attribs
            .iter()
            .all(|attrib| attribute(row, attrib) == attribute(candidate, attrib))
    })
}

fn uuid_is_valid(value: Option<&str>) -> bool {
    value.is_some_and(|v| uuid::Uuid::parse_str(v).is_ok())
}

/// Generate a fresh uuid when the table requires one and the row's is
/// missing or malformed. Never an error.
fn repair_uuid(spec: &SchemaSpec, table: &str, row: &mut Row) {
    let wants_uuid = spec
        .get_table(table)
        .is_some_and(|def| def.has_column("uuid"));
    if wants_uuid && !uuid_is_valid(str_value(row, "uuid")) {
        row.insert("uuid".into(), json!(uuid::Uuid::new_v4().to_string()));
    }
}

/// Sanitize a batch: returns the cleaned batch plus the problems bucket.
///
/// Duplicate detection is structural equality on a type-specific key:
/// posts on (title, slug), tags on (name, slug), compared only against
/// rows already accepted within this same batch. Diverted problem rows are
/// annotated with the surviving row's id under `duplicate_of`.
pub fn sanitize(spec: &SchemaSpec, mut batch: ImportBatch) -> (ImportBatch, Problems) {
    let mut table_names: Vec<String> = batch.data.keys().cloned().collect();
    table_names.sort_by_key(|name| (table_priority(name), name.clone()));

    let mut problems = Problems::new();
    // duplicate tag import-id -> surviving tag import-id
    let mut duplicate_tags: HashMap<i64, i64> = HashMap::new();

    for table in table_names {
        let rows = batch.data.remove(&table).unwrap_or_default();
        let mut accepted: Vec<Row> = Vec::with_capacity(rows.len());
        let mut diverted: Vec<Row> = Vec::new();

        for mut row in rows {
            repair_uuid(spec, &table, &mut row);

            match table.as_str() {
                "posts" => {
                    if let Some(original) = find_duplicate(&accepted, &row, &["title", "slug"]) {
                        if let Some(original_id) = int_value(original, "id") {
                            row.insert("duplicate_of".into(), json!(original_id));
                        }
                        diverted.push(row);
                        continue;
                    }
                }
                "tags" => {
                    if let Some(original) = find_duplicate(&accepted, &row, &["name", "slug"]) {
                        if let (Some(dup_id), Some(original_id)) =
                            (int_value(&row, "id"), int_value(original, "id"))
                        {
                            duplicate_tags.insert(dup_id, original_id);
                            row.insert("duplicate_of".into(), json!(original_id));
                        }
                        diverted.push(row);
                        continue;
                    }
                }
                "posts_tags" => {
                    // point links at the surviving tag instead of dropping them
                    if let Some(tag_id) = int_value(&row, "tag_id") {
                        if let Some(original_id) = duplicate_tags.get(&tag_id) {
                            row.insert("tag_id".into(), json!(original_id));
                        }
                    }
                }
                _ => {}
            }

            accepted.push(row);
        }

        batch.data.insert(table.clone(), accepted);
        if !diverted.is_empty() {
            debug!(table = %table, count = diverted.len(), "diverted duplicate rows");
            problems.insert(table, diverted);
        }
    }

    (batch, problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportBatch;
    use crate::schema::default_schema;
    use crate::store::row_from;

    fn batch_with(table: &str, rows: Vec<Row>) -> ImportBatch {
        let mut batch = ImportBatch::default();
        batch.data.insert(table.into(), rows);
        batch
    }

    #[test]
    fn test_missing_uuid_is_generated() {
        let spec = default_schema();
        let batch = batch_with(
            "posts",
            vec![row_from(&[("title", json!("a")), ("slug", json!("a"))])],
        );

        let (clean, problems) = sanitize(&spec, batch);

        assert!(problems.is_empty());
        let uuid = str_value(&clean.data["posts"][0], "uuid").unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn test_malformed_uuid_is_replaced() {
        let spec = default_schema();
        let batch = batch_with(
            "tags",
            vec![row_from(&[
                ("name", json!("t")),
                ("slug", json!("t")),
                ("uuid", json!("definitely-not-a-uuid")),
            ])],
        );

        let (clean, _problems) = sanitize(&spec, batch);

        let uuid = str_value(&clean.data["tags"][0], "uuid").unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn test_duplicate_posts_are_diverted() {
        let spec = default_schema();
        let batch = batch_with(
            "posts",
            vec![
                row_from(&[("id", json!(1)), ("title", json!("a")), ("slug", json!("a"))]),
                row_from(&[
                    ("id", json!(2)),
                    ("title", json!("a")),
                    ("slug", json!("a")),
                    ("markdown", json!("different body")),
                ]),
            ],
        );

        let (clean, problems) = sanitize(&spec, batch);

        assert_eq!(clean.data["posts"].len(), 1);
        assert_eq!(problems["posts"].len(), 1);
        assert_eq!(int_value(&problems["posts"][0], "duplicate_of"), Some(1));
    }

    #[test]
    fn test_duplicate_tag_links_are_rewritten() {
        let spec = default_schema();
        let mut batch = ImportBatch::default();
        batch.data.insert(
            "tags".into(),
            vec![
                row_from(&[("id", json!(10)), ("name", json!("t")), ("slug", json!("t"))]),
                row_from(&[("id", json!(11)), ("name", json!("t")), ("slug", json!("t"))]),
            ],
        );
        batch.data.insert(
            "posts_tags".into(),
            vec![row_from(&[("post_id", json!(1)), ("tag_id", json!(11))])],
        );

        let (clean, problems) = sanitize(&spec, batch);

        assert_eq!(clean.data["tags"].len(), 1);
        assert_eq!(problems["tags"].len(), 1);
        assert_eq!(int_value(&clean.data["posts_tags"][0], "tag_id"), Some(10));
    }

    #[test]
    fn test_distinct_rows_are_kept() {
        let spec = default_schema();
        let batch = batch_with(
            "posts",
            vec![
                row_from(&[("title", json!("a")), ("slug", json!("a"))]),
                row_from(&[("title", json!("a")), ("slug", json!("b"))]),
            ],
        );

        let (clean, problems) = sanitize(&spec, batch);

        assert_eq!(clean.data["posts"].len(), 2);
        assert!(problems.is_empty());
    }
}
