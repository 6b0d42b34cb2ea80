//! Grid-shaped JSON back to flat import rows.

use crate::forward::GridRow;
use serde_json::{Map, Value as JsonValue};

/// Turn exported grid JSON into the flat row objects the importer reads.
///
/// Each `{"id", "cells", "path"}` row becomes an object keyed by `key_field`
/// with one member per cell. The path is written under `path_field` unless it
/// is empty.
///
/// # Example
///
/// ```
/// use table_json::flatten_grid_rows;
///
/// let grid = r#"[{"id": "Sword", "cells": [{"columnId": "Price", "value": 30}], "path": ""}]"#;
/// let flat: serde_json::Value =
///     serde_json::from_str(&flatten_grid_rows(grid, "Name", "_path").unwrap()).unwrap();
/// assert_eq!(flat, serde_json::json!([{"Name": "Sword", "Price": 30}]));
/// ```
pub fn flatten_grid_rows(
    text: &str,
    key_field: &str,
    path_field: &str,
) -> Result<String, serde_json::Error> {
    let rows: Vec<GridRow> = serde_json::from_str(text)?;
    let flat: Vec<JsonValue> = rows
        .into_iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert(key_field.to_string(), JsonValue::String(row.id));
            for cell in row.cells {
                object.insert(cell.column_id, cell.value);
            }
            if !row.path.is_empty() {
                object.insert(path_field.to_string(), JsonValue::String(row.path));
            }
            JsonValue::Object(object)
        })
        .collect();
    serde_json::to_string_pretty(&flat)
}
