//! Conversion of rows with an unknown shape into JSON objects.

use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Column, Row, TypeInfo, ValueRef};

use crate::errors::AppError;

pub type JsonRow = Map<String, Value>;

/// Maps one row to a JSON object keyed by column name, using the storage
/// class of each value rather than the declared column type.
pub fn row_to_json(row: &SqliteRow) -> Result<JsonRow, AppError> {
    let mut object = Map::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }

    Ok(object)
}

pub fn rows_to_json(rows: &[SqliteRow]) -> Result<Vec<JsonRow>, AppError> {
    rows.iter().map(row_to_json).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::rows_to_json;
    use crate::db::connect_memory;

    #[tokio::test]
    async fn converts_each_storage_class() {
        let pool = connect_memory().await.expect("memory pool");
        let rows = sqlx::query(
            "SELECT 7 AS whole, 2.5 AS fraction, 'text' AS label, NULL AS missing, x'0102' AS bytes",
        )
        .fetch_all(&pool)
        .await
        .expect("select");

        let converted = rows_to_json(&rows).expect("conversion");
        assert_eq!(converted.len(), 1);
        assert_eq!(
            serde_json::Value::Object(converted[0].clone()),
            json!({
                "whole": 7,
                "fraction": 2.5,
                "label": "text",
                "missing": null,
                "bytes": [1, 2]
            })
        );
    }
}
