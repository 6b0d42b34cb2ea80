//! Reverse conversion: JSON rows → typed row store.
//!
//! Import never aborts on a bad row, field or entry. Every problem is
//! appended to the [`Diagnostics`] of the returned [`ImportReport`], and only
//! an unusable document as a whole makes the import fail.

use crate::options::{DuplicatePolicy, ImportOptions};
use crate::resolver::{self, json_type_name, Resolution};
use serde_json::{Map, Value as JsonValue};
use table_core::{
    make_valid_name, CoercionError, CoercionRegistry, Diagnostics, FieldDescriptor, Record,
    RecordSchema, Row, RowStore, SchemaSet, TypeTag, Value, ValueMap, ValueSet,
};
use tracing::{debug, info, warn};

/// Outcome of one import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Whether the document parsed and its rows were walked
    pub ok: bool,

    /// Problems in encounter order
    pub diagnostics: Diagnostics,
}

impl ImportReport {
    /// Check if the import succeeded without a single problem.
    pub fn is_clean(&self) -> bool {
        self.ok && self.diagnostics.is_empty()
    }

    pub fn problems(&self) -> &[String] {
        self.diagnostics.as_slice()
    }
}

/// Import a JSON array of row objects into `store`, replacing its rows.
///
/// The store is only cleared once the document has parsed.
///
/// # Example
///
/// ```
/// use table_core::{CoercionRegistry, RowStore, SchemaSet, Value};
/// use table_json::{import_rows, ImportOptions};
///
/// let schemas = SchemaSet::from_yaml(
///     "row: Item\nrecords:\n  - name: Item\n    fields:\n      - { name: Price, type: int32 }\n",
/// )
/// .unwrap();
/// let mut store = RowStore::new();
/// let report = import_rows(
///     r#"[{"Name": "Sword", "Price": 30}]"#,
///     &schemas,
///     &mut store,
///     &ImportOptions::default(),
///     &CoercionRegistry::default(),
/// );
/// assert!(report.is_clean());
/// let sword = store.find("Sword").unwrap();
/// assert_eq!(sword.record.get("Price"), Some(&Value::Int(30)));
/// ```
pub fn import_rows(
    json_text: &str,
    schemas: &SchemaSet,
    store: &mut RowStore,
    options: &ImportOptions,
    coercions: &CoercionRegistry,
) -> ImportReport {
    let mut importer = JsonImporter {
        schemas,
        options,
        coercions,
        diagnostics: Diagnostics::new(),
    };
    let ok = importer.read_table(json_text, store);
    info!(
        ok,
        rows = store.len(),
        problems = importer.diagnostics.len(),
        "JSON import finished"
    );
    ImportReport {
        ok,
        diagnostics: importer.diagnostics,
    }
}

/// Where a value is being read, for diagnostics.
#[derive(Debug, Clone, Copy)]
enum Site<'s> {
    Field {
        field: &'s str,
        row: &'s str,
    },
    Entry {
        index: usize,
        field: &'s str,
        row: &'s str,
    },
}

impl<'s> Site<'s> {
    fn row(&self) -> &'s str {
        match *self {
            Site::Field { row, .. } | Site::Entry { row, .. } => row,
        }
    }

    fn field(&self) -> &'s str {
        match *self {
            Site::Field { field, .. } | Site::Entry { field, .. } => field,
        }
    }

    fn entry(&self, index: usize) -> Site<'s> {
        match *self {
            Site::Field { field, row } | Site::Entry { field, row, .. } => {
                Site::Entry { index, field, row }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Site::Field { field, row } => format!("Property '{field}' on row '{row}'"),
            Site::Entry { index, field, row } => {
                format!("Entry {index} on property '{field}' on row '{row}'")
            }
        }
    }

    fn wrong_type(&self, expected: &str, got: &JsonValue) -> String {
        format!(
            "{} is the incorrect type. Expected {expected}, got {}.",
            self.describe(),
            json_type_name(got)
        )
    }

    fn invalid_enum(&self, text: &str) -> String {
        format!("{} has invalid enum value: {text}.", self.describe())
    }

    fn key_problem(&self, key: &str, err: &CoercionError) -> String {
        format!(
            "Problem assigning key '{key}' to property '{}' on row '{}' : {err}",
            self.field(),
            self.row()
        )
    }

    fn assign_problem(&self, text: &str, err: &CoercionError) -> String {
        match self {
            Site::Field { field, row } => {
                format!("Problem assigning string '{text}' to property '{field}' on row '{row}' : {err}")
            }
            Site::Entry { index, field, row } => format!(
                "Problem assigning string '{text}' to entry {index} on property '{field}' on row '{row}' : {err}"
            ),
        }
    }
}

/// Integer held by a JSON number, truncating fractions.
fn json_integer(value: &JsonValue) -> Option<i64> {
    let number = value.as_number()?;
    number
        .as_i64()
        .or_else(|| number.as_u64().map(|u| u as i64))
        .or_else(|| number.as_f64().map(|f| f as i64))
}

/// Raw row key: strings as-is, numbers as their JSON text.
fn key_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

struct JsonImporter<'a> {
    schemas: &'a SchemaSet,
    options: &'a ImportOptions,
    coercions: &'a CoercionRegistry,
    diagnostics: Diagnostics,
}

impl<'a> JsonImporter<'a> {
    fn fatal(&mut self, message: String) -> bool {
        warn!(%message, "JSON import failed");
        self.diagnostics.push(message);
        false
    }

    fn read_table(&mut self, json_text: &str, store: &mut RowStore) -> bool {
        if json_text.is_empty() {
            return self.fatal("Input data is empty.".to_string());
        }

        let schemas = self.schemas;
        let Some(row_schema) = schemas.row_schema() else {
            return self.fatal("No row schema specified.".to_string());
        };

        let parse_error = |detail: String| format!("Failed to parse the JSON data. Error: {detail}");
        let rows = match serde_json::from_str::<JsonValue>(json_text) {
            Ok(JsonValue::Array(rows)) if !rows.is_empty() => rows,
            Ok(JsonValue::Array(_)) => {
                return self.fatal(parse_error("the top-level array is empty".to_string()));
            }
            Ok(other) => {
                return self.fatal(parse_error(format!(
                    "expected a top-level Array, got {}",
                    json_type_name(&other)
                )));
            }
            Err(e) => return self.fatal(parse_error(e.to_string())),
        };

        store.clear();

        for (idx, row) in rows.iter().enumerate() {
            let Some(object) = row.as_object() else {
                self.diagnostics
                    .push(format!("Row '{idx}' is not a valid JSON object."));
                continue;
            };
            if !self.read_row(object, idx, row_schema, store) {
                self.diagnostics.push(format!("Failed to read row '{idx}'."));
            }
        }

        true
    }

    fn read_row(
        &mut self,
        object: &Map<String, JsonValue>,
        idx: usize,
        row_schema: &RecordSchema,
        store: &mut RowStore,
    ) -> bool {
        let (options, schemas) = (self.options, self.schemas);
        let key_field = match options.key_field.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => schemas.key_field_name(),
        };

        let Some(key) = object
            .get(key_field)
            .and_then(key_text)
            .and_then(|raw| make_valid_name(&raw))
        else {
            self.diagnostics
                .push(format!("Row '{idx}' missing key field '{key_field}'."));
            return false;
        };

        if store.contains_key(&key) {
            match options.duplicate_policy {
                DuplicatePolicy::Reject => {
                    self.diagnostics.push(format!("Duplicate row name '{key}'."));
                    return false;
                }
                DuplicatePolicy::Ignore => {
                    debug!(row = %key, idx, "ignoring duplicate row");
                    return true;
                }
                DuplicatePolicy::Replace => {
                    debug!(row = %key, idx, "replacing duplicate row");
                }
            }
        }

        let resolution = resolver::resolve(object, row_schema, Some(key_field));
        if !options.ignore_extra_fields {
            for extra in &resolution.unmapped {
                self.diagnostics.push(format!(
                    "Property '{extra}' on row '{key}' cannot be found in struct '{}'.",
                    row_schema.name
                ));
            }
        }

        store.replace(Row::new(
            key.clone(),
            Record::default_for(row_schema, schemas),
        ));
        let Some(row) = store.find_mut(&key) else {
            return false;
        };
        debug!(row = %key, idx, "reading row");
        self.read_record(&resolution, &key, &mut row.record)
    }

    /// Read every resolved field into `record`. Returns false if any field
    /// failed; later fields are still read.
    fn read_record(&mut self, resolution: &Resolution<'_>, row: &str, record: &mut Record) -> bool {
        let mut ok = true;
        for &(field, json) in &resolution.fields {
            let Some(json) = json else {
                if !field.optional && !self.options.ignore_missing_fields {
                    self.diagnostics.push(format!(
                        "Row '{row}' is missing an entry for '{}'.",
                        field.name
                    ));
                }
                continue;
            };

            if record.get(&field.name).is_none() {
                record.set(field.name.clone(), self.default_slot(field));
            }
            let Some(slot) = record.get_mut(&field.name) else {
                continue;
            };

            let site = Site::Field {
                field: &field.name,
                row,
            };
            let field_ok = if field.is_fixed_array() {
                self.read_fixed_array(json, field, site, slot)
            } else {
                self.read_field(json, &field.field_type, site, slot)
            };
            ok &= field_ok;
        }
        ok
    }

    fn default_slot(&self, field: &FieldDescriptor) -> Value {
        let slot = Value::default_for(&field.field_type, self.schemas);
        if field.is_fixed_array() {
            Value::Array(vec![slot; field.arity])
        } else {
            slot
        }
    }

    /// Read a scalar field, retrying once on string values that hold a JSON
    /// document.
    fn read_field(&mut self, json: &JsonValue, tag: &TypeTag, site: Site<'_>, slot: &mut Value) -> bool {
        if self.read_value(json, tag, site, slot) {
            return true;
        }
        if !self.options.reparse_string_values {
            return false;
        }
        let Some(text) = json.as_str() else {
            return false;
        };
        match serde_json::from_str::<JsonValue>(text) {
            Ok(reparsed) => {
                debug!(field = %site.describe(), "retrying with reparsed string value");
                self.read_value(&reparsed, tag, site, slot)
            }
            Err(_) => false,
        }
    }

    fn read_fixed_array(
        &mut self,
        json: &JsonValue,
        field: &FieldDescriptor,
        site: Site<'_>,
        slot: &mut Value,
    ) -> bool {
        let Some(items) = json.as_array() else {
            self.diagnostics.push(site.wrong_type("Array", json));
            return false;
        };

        if items.len() != field.arity {
            self.diagnostics.push(format!(
                "{} is a static sized array with {} elements, but we have {} values to import.",
                site.describe(),
                field.arity,
                items.len()
            ));
        }

        if !matches!(slot, Value::Array(slots) if slots.len() == field.arity) {
            *slot = self.default_slot(field);
        }
        let Value::Array(slots) = slot else {
            return false;
        };
        for (index, item) in items.iter().enumerate().take(field.arity) {
            self.read_value(item, &field.field_type, site.entry(index), &mut slots[index]);
        }
        true
    }

    /// Read one value of type `tag` into `slot`.
    ///
    /// Containers are only accepted at field sites; inside another container
    /// they always fail.
    fn read_value(&mut self, json: &JsonValue, tag: &TypeTag, site: Site<'_>, slot: &mut Value) -> bool {
        let schemas = self.schemas;
        match tag {
            TypeTag::Enum { enum_name, width } => {
                if let Some(text) = json.as_str() {
                    match schemas.enum_def(enum_name).and_then(|def| def.value_of(text)) {
                        Some(value) => *slot = Value::Enum(value),
                        None => {
                            self.diagnostics.push(site.invalid_enum(text));
                            return false;
                        }
                    }
                } else {
                    let Some(value) = json_integer(json) else {
                        self.diagnostics.push(site.wrong_type("Integer", json));
                        return false;
                    };
                    *slot = Value::Enum(width.truncate(value, false));
                }
                true
            }
            TypeTag::Integer {
                width,
                signed,
                enum_name,
            } => {
                if let (Some(enum_name), Some(text)) = (enum_name, json.as_str()) {
                    let Some(value) = schemas.enum_def(enum_name).and_then(|def| def.value_of(text)) else {
                        self.diagnostics.push(site.invalid_enum(text));
                        return false;
                    };
                    *slot = Value::Int(width.truncate(value, *signed));
                    return true;
                }
                let Some(value) = json_integer(json) else {
                    self.diagnostics.push(site.wrong_type("Integer", json));
                    return false;
                };
                *slot = Value::Int(width.truncate(value, *signed));
                true
            }
            TypeTag::Float { width, enum_name } => {
                if let (Some(enum_name), Some(text)) = (enum_name, json.as_str()) {
                    let Some(value) = schemas.enum_def(enum_name).and_then(|def| def.value_of(text)) else {
                        self.diagnostics.push(site.invalid_enum(text));
                        return false;
                    };
                    *slot = Value::Float(width.narrow(value as f64));
                    return true;
                }
                let Some(value) = json.as_f64() else {
                    self.diagnostics.push(site.wrong_type("Double", json));
                    return false;
                };
                *slot = Value::Float(width.narrow(value));
                true
            }
            TypeTag::Boolean => {
                let Some(value) = json.as_bool() else {
                    self.diagnostics.push(site.wrong_type("Boolean", json));
                    return false;
                };
                *slot = Value::Bool(value);
                true
            }
            TypeTag::DynamicArray(_) | TypeTag::Set(_) | TypeTag::Map { .. }
                if matches!(site, Site::Entry { .. }) =>
            {
                self.diagnostics
                    .push(format!("{} cannot nest containers.", site.describe()));
                false
            }
            TypeTag::DynamicArray(element) => self.read_array(json, element, site, slot),
            TypeTag::Set(element) => self.read_set(json, element, site, slot),
            TypeTag::Map { key, value } => self.read_map(json, key, value, site, slot),
            TypeTag::Record(name) => {
                if let (Some(object), Some(schema)) = (json.as_object(), schemas.record(name)) {
                    if !matches!(slot, Value::Record(_)) {
                        *slot = Value::default_for(tag, schemas);
                    }
                    let Value::Record(record) = slot else {
                        return false;
                    };
                    let resolution = resolver::resolve(object, schema, None);
                    return self.read_record(&resolution, site.row(), record);
                }
                self.assign_string(json, tag, site, slot)
            }
            TypeTag::String | TypeTag::Custom(_) => self.assign_string(json, tag, site, slot),
        }
    }

    /// Coerce a JSON string through the coercion registry.
    fn assign_string(&mut self, json: &JsonValue, tag: &TypeTag, site: Site<'_>, slot: &mut Value) -> bool {
        let Some(text) = json.as_str() else {
            self.diagnostics.push(site.wrong_type("String", json));
            return false;
        };
        match self.coercions.parse(text, tag, self.schemas) {
            Ok(value) => {
                *slot = value;
                true
            }
            Err(e) => {
                self.diagnostics.push(site.assign_problem(text, &e));
                false
            }
        }
    }

    /// Entries that fail stay in the array at their default value.
    fn read_array(&mut self, json: &JsonValue, element: &TypeTag, site: Site<'_>, slot: &mut Value) -> bool {
        let Some(items) = json.as_array() else {
            self.diagnostics.push(site.wrong_type("Array", json));
            return false;
        };

        let mut values = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut value = Value::default_for(element, self.schemas);
            self.read_value(item, element, site.entry(index), &mut value);
            if !element.is_container() {
                values.push(value);
            }
        }
        *slot = Value::Array(values);
        true
    }

    fn read_set(&mut self, json: &JsonValue, element: &TypeTag, site: Site<'_>, slot: &mut Value) -> bool {
        let Some(items) = json.as_array() else {
            self.diagnostics.push(site.wrong_type("Array", json));
            return false;
        };

        let mut set = ValueSet::new();
        for (index, item) in items.iter().enumerate() {
            let mut value = Value::default_for(element, self.schemas);
            self.read_value(item, element, site.entry(index), &mut value);
            if !element.is_container() {
                set.push_unindexed(value);
            }
        }

        let dropped = set.rehash();
        if dropped > 0 {
            self.diagnostics.push(format!(
                "{} has {dropped} duplicate set entries, which were dropped.",
                site.describe()
            ));
        }
        *slot = Value::Set(set);
        true
    }

    /// A bad key or value discards the whole map.
    fn read_map(
        &mut self,
        json: &JsonValue,
        key_tag: &TypeTag,
        value_tag: &TypeTag,
        site: Site<'_>,
        slot: &mut Value,
    ) -> bool {
        let Some(members) = json.as_object() else {
            self.diagnostics.push(site.wrong_type("Object", json));
            return false;
        };

        *slot = Value::Map(ValueMap::new());
        let mut map = ValueMap::new();
        for (index, (raw_key, member)) in members.iter().enumerate() {
            let key = if key_tag.is_container() {
                Err(CoercionError::new("cannot nest containers"))
            } else {
                self.coercions.parse(raw_key, key_tag, self.schemas)
            };
            let key = match key {
                Ok(key) => key,
                Err(e) => {
                    self.diagnostics.push(site.key_problem(raw_key, &e));
                    return false;
                }
            };

            let mut value = Value::default_for(value_tag, self.schemas);
            if !self.read_value(member, value_tag, site.entry(index), &mut value) {
                return false;
            }
            map.push_unindexed(key, value);
        }

        let dropped = map.rehash();
        if dropped > 0 {
            self.diagnostics.push(format!(
                "{} has {dropped} duplicate map keys, which were dropped.",
                site.describe()
            ));
        }
        *slot = Value::Map(map);
        true
    }
}
