//! Mapping of JSON object keys onto schema fields.

use serde_json::{Map, Value as JsonValue};
use table_core::{FieldDescriptor, RecordSchema};

/// Result of matching one JSON object against a record schema.
#[derive(Debug)]
pub struct Resolution<'a> {
    /// Every field in schema order, with its JSON value when one was found
    pub fields: Vec<(&'a FieldDescriptor, Option<&'a JsonValue>)>,

    /// Object keys matching no field, in object order
    pub unmapped: Vec<&'a str>,
}

impl<'a> Resolution<'a> {
    /// Fields found in the object, in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&'a FieldDescriptor, &'a JsonValue)> + '_ {
        self.fields
            .iter()
            .filter_map(|&(field, value)| value.map(|value| (field, value)))
    }

    /// Fields with no matching key, in schema order.
    pub fn missing(&self) -> impl Iterator<Item = &'a FieldDescriptor> + '_ {
        self.fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|&(field, _)| field)
    }
}

/// Match the keys of `object` against the fields of `schema`.
///
/// `key_field` names the row key, which is never reported as unmapped.
pub fn resolve<'a>(
    object: &'a Map<String, JsonValue>,
    schema: &'a RecordSchema,
    key_field: Option<&str>,
) -> Resolution<'a> {
    Resolution {
        fields: schema
            .fields
            .iter()
            .map(|field| (field, lookup(object, field)))
            .collect(),
        unmapped: unmapped_keys(object, schema, key_field),
    }
}

/// JSON value of a field: the first of its import names present in `object`.
pub fn lookup<'a>(object: &'a Map<String, JsonValue>, field: &FieldDescriptor) -> Option<&'a JsonValue> {
    field
        .import_names()
        .into_iter()
        .find_map(|name| object.get(name))
}

/// Keys of `object` that name no field, canonically or by alias.
pub fn unmapped_keys<'a>(
    object: &'a Map<String, JsonValue>,
    schema: &RecordSchema,
    key_field: Option<&str>,
) -> Vec<&'a str> {
    object
        .keys()
        .map(String::as_str)
        .filter(|key| Some(*key) != key_field)
        .filter(|key| !schema.fields.iter().any(|f| f.answers_to(key)))
        .collect()
}

/// Name of a JSON value's type, as used in diagnostics.
pub fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "Null",
        JsonValue::String(_) => "String",
        JsonValue::Number(_) => "Number",
        JsonValue::Bool(_) => "Boolean",
        JsonValue::Array(_) => "Array",
        JsonValue::Object(_) => "Object",
    }
}
