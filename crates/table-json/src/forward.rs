//! Forward conversion: typed row store → grid JSON.
//!
//! Each exported row has the shape
//! `{"id": key, "cells": [{"columnId": field, "value": ...}], "path": text}`.
//! Cell values are limited to strings, numbers and booleans; anything richer
//! is written in its text form.

use crate::options::ExportOptions;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value as JsonValue};
use table_core::text::{format_float, format_slots, format_value};
use table_core::{
    CoercionRegistry, FieldDescriptor, FloatWidth, Record, RowStore, SchemaSet, TypeTag, Value,
};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Row record '{0}' not found in schema")]
    MissingRowSchema(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub id: String,
    pub cells: Vec<GridCell>,
    #[serde(default)]
    pub path: String,
}

/// One column value of an exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    #[serde(rename = "columnId")]
    pub column_id: String,
    pub value: JsonValue,
}

/// Export the rows `[start, start + max_count)` of `store` as pretty-printed
/// grid JSON.
///
/// A window starting past the last row exports `[]`.
pub fn export_rows(
    store: &RowStore,
    schemas: &SchemaSet,
    start: usize,
    max_count: usize,
    options: &ExportOptions,
    coercions: &CoercionRegistry,
) -> Result<String, ExportError> {
    let rows = grid_rows(store, schemas, start, max_count, options, coercions)?;
    let text = serde_json::to_string_pretty(&rows)?;
    info!(
        start,
        max_count,
        exported = rows.len(),
        total = store.len(),
        "JSON export finished"
    );
    Ok(text)
}

/// Build the grid rows of one export window without serializing them.
pub fn grid_rows(
    store: &RowStore,
    schemas: &SchemaSet,
    start: usize,
    max_count: usize,
    options: &ExportOptions,
    coercions: &CoercionRegistry,
) -> Result<Vec<GridRow>, ExportError> {
    let row_schema = schemas
        .row_schema()
        .ok_or_else(|| ExportError::MissingRowSchema(schemas.row.clone()))?;
    let path_field = options.path_field_name(schemas);

    let writer = CellWriter {
        schemas,
        coercions,
        export_containers: options.export_containers,
    };

    let rows = store
        .window(start, max_count)
        .iter()
        .map(|row| {
            debug!(row = %row.key, "exporting row");
            let mut path = String::new();
            let mut cells = Vec::with_capacity(row_schema.fields.len());
            for field in &row_schema.fields {
                let Some(value) = row.record.get(&field.name) else {
                    continue;
                };
                if field.name == path_field {
                    path = writer.text(value, field);
                    continue;
                }
                cells.push(GridCell {
                    column_id: field.name.clone(),
                    value: writer.cell(value, field),
                });
            }
            GridRow {
                id: row.key.clone(),
                cells,
                path,
            }
        })
        .collect();
    Ok(rows)
}

struct CellWriter<'a> {
    schemas: &'a SchemaSet,
    coercions: &'a CoercionRegistry,
    export_containers: bool,
}

impl CellWriter<'_> {
    fn enum_name(&self, tag: &TypeTag, value: i64) -> Option<&str> {
        tag.enum_backing()
            .and_then(|name| self.schemas.enum_def(name))
            .and_then(|def| def.name_of(value))
    }

    /// Text form of a whole field, honoring fixed arity.
    fn text(&self, value: &Value, field: &FieldDescriptor) -> String {
        match value {
            Value::Array(slots) if field.is_fixed_array() => {
                format_slots(slots, field, self.schemas, self.coercions)
            }
            _ => format_value(value, &field.field_type, self.schemas, self.coercions),
        }
    }

    fn cell(&self, value: &Value, field: &FieldDescriptor) -> JsonValue {
        if field.is_fixed_array() {
            return json!(self.text(value, field));
        }
        let tag = &field.field_type;
        match (tag, value) {
            (TypeTag::Enum { .. }, Value::Enum(v) | Value::Int(v)) => match self.enum_name(tag, *v) {
                Some(name) => json!(name),
                None => json!(v.to_string()),
            },
            (TypeTag::Integer { .. }, Value::Int(v)) => match self.enum_name(tag, *v) {
                Some(name) => json!(name),
                None => json!(*v),
            },
            (TypeTag::Float { width, .. }, Value::Float(v)) => self.float_cell(tag, *v, *width),
            (TypeTag::Boolean, Value::Bool(b)) => json!(*b),
            (TypeTag::DynamicArray(element) | TypeTag::Set(element), _)
                if self.export_containers =>
            {
                let items: Vec<JsonValue> = match value {
                    Value::Array(items) => items.iter().map(|v| self.native(v, element)).collect(),
                    Value::Set(set) => set.iter().map(|v| self.native(v, element)).collect(),
                    _ => Vec::new(),
                };
                json!(JsonValue::Array(items).to_string())
            }
            _ => json!(self.text(value, field)),
        }
    }

    fn float_cell(&self, tag: &TypeTag, value: f64, width: FloatWidth) -> JsonValue {
        if value.fract() == 0.0 {
            if let Some(name) = self.enum_name(tag, value as i64) {
                return json!(name);
            }
        }
        match Number::from_f64(value) {
            Some(number) => JsonValue::Number(number),
            None => json!(format_float(value, width)),
        }
    }

    /// Native JSON form of a container element.
    fn native(&self, value: &Value, tag: &TypeTag) -> JsonValue {
        match value {
            Value::Bool(b) => json!(*b),
            Value::Int(v) => json!(*v),
            Value::Enum(v) => match self.enum_name(tag, *v) {
                Some(name) => json!(name),
                None => json!(*v),
            },
            Value::Float(v) => match Number::from_f64(*v) {
                Some(number) => JsonValue::Number(number),
                None => json!(v.to_string()),
            },
            Value::Record(record) => self.native_record(record),
            Value::Array(items) => {
                let element = element_of(tag);
                JsonValue::Array(items.iter().map(|v| self.native(v, element)).collect())
            }
            Value::Set(set) => {
                let element = element_of(tag);
                JsonValue::Array(set.iter().map(|v| self.native(v, element)).collect())
            }
            Value::Text(_) | Value::DateTime(_) | Value::Guid(_) | Value::Map(_) => {
                json!(format_value(value, tag, self.schemas, self.coercions))
            }
        }
    }

    fn native_record(&self, record: &Record) -> JsonValue {
        let schema = self.schemas.record(record.type_name());
        let mut object = Map::new();
        for (name, value) in record.iter() {
            let json = match schema.and_then(|s| s.field(name)) {
                Some(field) if field.is_fixed_array() => match value {
                    Value::Array(slots) => JsonValue::Array(
                        slots
                            .iter()
                            .map(|v| self.native(v, &field.field_type))
                            .collect(),
                    ),
                    _ => self.native(value, &field.field_type),
                },
                Some(field) => self.native(value, &field.field_type),
                None => self.native(value, &TypeTag::String),
            };
            object.insert(name.to_string(), json);
        }
        JsonValue::Object(object)
    }
}

fn element_of(tag: &TypeTag) -> &TypeTag {
    match tag {
        TypeTag::DynamicArray(element) | TypeTag::Set(element) => element,
        other => other,
    }
}
