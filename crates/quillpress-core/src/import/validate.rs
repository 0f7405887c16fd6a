//! Schema-shape validation of import rows.
//!
//! Every row of every table is validated independently and every failure is
//! collected; a single bad row never hides the rest. Any issue at all
//! rejects the import before a write occurs.

use super::ImportBatch;
use crate::error::{Error, ValidationIssue};
use crate::schema::{ColumnType, SchemaSpec, TableDef};
use crate::store::Row;
use serde_json::Value;

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_integerish(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64().is_some(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        Value::Bool(_) => true,
        _ => false,
    }
}

fn is_boolish(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

// Only keys present on the row are checked: absent columns are filled in by
// defaults or by the importer, and rejecting them would refuse otherwise
// importable snapshots.
fn validate_row(table: &TableDef, row: &Row, issues: &mut Vec<ValidationIssue>) {
    for column in &table.columns {
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        let property = format!("{}.{}", table.name, column.name);

        let blank = matches!(value, Value::Null) || value.as_str() == Some("");
        if blank {
            if !column.nullable {
                issues.push(ValidationIssue {
                    table: table.name.clone(),
                    property,
                    value: None,
                    message: "cannot be blank".into(),
                });
            }
            continue;
        }

        match &column.col_type {
            ColumnType::String { maxlength } => {
                if let Some(text) = value.as_str() {
                    if text.chars().count() > *maxlength {
                        issues.push(ValidationIssue {
                            table: table.name.clone(),
                            property,
                            value: display_value(value),
                            message: format!(
                                "exceeds maximum length of {maxlength} characters"
                            ),
                        });
                    }
                }
            }
            ColumnType::Integer | ColumnType::BigInteger | ColumnType::Increments => {
                if !is_integerish(value) {
                    issues.push(ValidationIssue {
                        table: table.name.clone(),
                        property,
                        value: display_value(value),
                        message: "is not an integer".into(),
                    });
                }
            }
            ColumnType::Bool => {
                if !is_boolish(value) {
                    issues.push(ValidationIssue {
                        table: table.name.clone(),
                        property,
                        value: display_value(value),
                        message: "is not a boolean".into(),
                    });
                }
            }
            _ => {}
        }
    }
}

/// Validate every row of the batch against the declared schema. Tables the
/// schema does not know are passed over (the importer ignores them too).
pub fn validate_batch(spec: &SchemaSpec, batch: &ImportBatch) -> Result<(), Error> {
    let mut issues = Vec::new();
    for (table_name, rows) in &batch.data {
        let Some(table) = spec.get_table(table_name) else {
            continue;
        };
        for row in rows {
            validate_row(table, row, &mut issues);
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportBatch;
    use crate::schema::default_schema;
    use crate::store::row_from;
    use serde_json::json;

    fn batch_with(table: &str, rows: Vec<Row>) -> ImportBatch {
        let mut batch = ImportBatch::default();
        batch.data.insert(table.into(), rows);
        batch
    }

    #[test]
    fn test_blank_required_field_is_an_issue() {
        let spec = default_schema();
        let batch = batch_with(
            "posts",
            vec![row_from(&[("title", json!("")), ("slug", json!("ok"))])],
        );

        let err = validate_batch(&spec, &batch).unwrap_err();
        match err {
            Error::Validation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].property, "posts.title");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_issues_aggregate_across_rows_and_tables() {
        let spec = default_schema();
        let mut batch = batch_with(
            "posts",
            vec![
                row_from(&[("title", json!(""))]),
                row_from(&[("featured", json!("maybe"))]),
            ],
        );
        batch.data.insert(
            "tags".into(),
            vec![row_from(&[("name", json!("x".repeat(151)))])],
        );

        let err = validate_batch(&spec, &batch).unwrap_err();
        match err {
            Error::Validation(issues) => assert_eq!(issues.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_blank_and_absent_fields_pass() {
        let spec = default_schema();
        let batch = batch_with(
            "posts",
            vec![row_from(&[
                ("title", json!("ok")),
                ("slug", json!("ok")),
                ("markdown", json!(null)),
            ])],
        );

        assert!(validate_batch(&spec, &batch).is_ok());
    }

    #[test]
    fn test_numeric_strings_count_as_integers() {
        let spec = default_schema();
        let batch = batch_with(
            "posts_tags",
            vec![row_from(&[
                ("post_id", json!("3")),
                ("tag_id", json!(4)),
            ])],
        );

        assert!(validate_batch(&spec, &batch).is_ok());
    }

    #[test]
    fn test_unknown_tables_are_ignored() {
        let spec = default_schema();
        let batch = batch_with("mystery", vec![row_from(&[("anything", json!(1))])]);

        assert!(validate_batch(&spec, &batch).is_ok());
    }
}
