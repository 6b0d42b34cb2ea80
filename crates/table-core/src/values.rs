//! Typed values and the row store.
//!
//! A [`RowStore`] owns every [`Row`]; a row owns its [`Record`]; a record owns
//! its field values, including nested records and container elements.

use crate::schema::{RecordSchema, SchemaSet};
use crate::types::TypeTag;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// One typed value held in a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),

    /// Integer, already truncated to its declared width
    Int(i64),

    /// Floating point number, already narrowed to its declared width
    Float(f64),

    /// Underlying integer of an enum
    Enum(i64),

    /// String, or a free-form custom value kept verbatim
    Text(String),

    DateTime(DateTime<Utc>),

    Guid(Uuid),

    /// Dynamic array, or the slots of a fixed-size field
    Array(Vec<Value>),

    Set(ValueSet),

    Map(ValueMap),

    Record(Record),
}

impl Value {
    /// Default-initialized value of a single slot of `tag`.
    ///
    /// Unknown record references produce an empty record of that name.
    pub fn default_for(tag: &TypeTag, schemas: &SchemaSet) -> Self {
        match tag {
            TypeTag::Enum { .. } => Value::Enum(0),
            TypeTag::Integer { .. } => Value::Int(0),
            TypeTag::Float { .. } => Value::Float(0.0),
            TypeTag::Boolean => Value::Bool(false),
            TypeTag::String | TypeTag::Custom(_) => Value::Text(String::new()),
            TypeTag::DynamicArray(_) => Value::Array(Vec::new()),
            TypeTag::Set(_) => Value::Set(ValueSet::new()),
            TypeTag::Map { .. } => Value::Map(ValueMap::new()),
            TypeTag::Record(name) => Value::Record(match schemas.record(name) {
                Some(schema) => Record::default_for(schema, schemas),
                None => Record::empty(name.clone()),
            }),
        }
    }

    /// Canonical text used as the equality key of sets and maps.
    pub fn index_key(&self) -> String {
        let mut key = String::new();
        self.write_index_key(&mut key);
        key
    }

    fn write_index_key(&self, out: &mut String) {
        match self {
            Value::Bool(b) => out.push_str(if *b { "b:1" } else { "b:0" }),
            Value::Int(i) => out.push_str(&format!("i:{i}")),
            Value::Float(f) => out.push_str(&format!("f:{:x}", f.to_bits())),
            Value::Enum(e) => out.push_str(&format!("e:{e}")),
            Value::Text(s) => {
                out.push_str(&format!("s{}:", s.len()));
                out.push_str(s);
            }
            Value::DateTime(dt) => out.push_str(&format!("t:{}", dt.to_rfc3339())),
            Value::Guid(g) => out.push_str(&format!("g:{g}")),
            Value::Array(items) => {
                out.push_str(&format!("a{}[", items.len()));
                for item in items {
                    item.write_index_key(out);
                    out.push(';');
                }
                out.push(']');
            }
            Value::Set(set) => {
                let mut keys: Vec<String> = set.iter().map(Value::index_key).collect();
                keys.sort();
                out.push_str(&format!("z{}[{}]", keys.len(), keys.join(";")));
            }
            Value::Map(map) => {
                let mut keys: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k.index_key(), v.index_key()))
                    .collect();
                keys.sort();
                out.push_str(&format!("m{}[{}]", keys.len(), keys.join(";")));
            }
            Value::Record(record) => {
                out.push_str(&format!("r:{}{{", record.type_name()));
                for (name, value) in record.iter() {
                    out.push_str(name);
                    out.push('=');
                    value.write_index_key(out);
                    out.push(';');
                }
                out.push('}');
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer or enum value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) | Self::Enum(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Field values of one record, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Record with no fields.
    pub fn empty(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Record with every field default-initialized.
    ///
    /// Fixed-size fields hold an array of `arity` default slots.
    pub fn default_for(schema: &RecordSchema, schemas: &SchemaSet) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| {
                let slot = Value::default_for(&field.field_type, schemas);
                let value = if field.is_fixed_array() {
                    Value::Array(vec![slot; field.arity])
                } else {
                    slot
                };
                (field.name.clone(), value)
            })
            .collect();
        Self {
            type_name: schema.name.clone(),
            fields,
        }
    }

    /// Name of the record type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a mutable field value by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Overwrite a field value, appending the field if the record lacks it.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Iterate over `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Set of unique values with an equality index.
///
/// Entries pushed with [`ValueSet::push_unindexed`] are invisible to
/// [`ValueSet::contains`] until [`ValueSet::rehash`] runs.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    entries: Vec<Value>,
    index: HashMap<String, usize>,
    needs_rehash: bool,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, keeping the index current. Returns false for a duplicate.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.needs_rehash {
            self.rehash();
        }
        let key = value.index_key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(value);
        true
    }

    /// Append a value without touching the index. Returns the entry position.
    pub fn push_unindexed(&mut self, value: Value) -> usize {
        self.needs_rehash = true;
        self.entries.push(value);
        self.entries.len() - 1
    }

    /// Rebuild the equality index in one pass, dropping later duplicates.
    ///
    /// Returns the number of entries dropped.
    pub fn rehash(&mut self) -> usize {
        let before = self.entries.len();
        let mut index = HashMap::with_capacity(before);
        let mut kept = Vec::with_capacity(before);
        for value in self.entries.drain(..) {
            let key = value.index_key();
            if let std::collections::hash_map::Entry::Vacant(slot) = index.entry(key) {
                slot.insert(kept.len());
                kept.push(value);
            }
        }
        self.entries = kept;
        self.index = index;
        self.needs_rehash = false;
        before - self.entries.len()
    }

    /// Check membership through the index.
    pub fn contains(&self, value: &Value) -> bool {
        self.index.contains_key(&value.index_key())
    }

    /// Check if entries were appended since the last rehash.
    pub fn needs_rehash(&self) -> bool {
        self.needs_rehash
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.needs_rehash = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|v| other.entries.iter().any(|o| o.index_key() == v.index_key()))
    }
}

/// Map from unique keys to values with an equality index on keys.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(Value, Value)>,
    index: HashMap<String, usize>,
    needs_rehash: bool,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry, keeping the index current.
    pub fn insert(&mut self, key: Value, value: Value) {
        if self.needs_rehash {
            self.rehash();
        }
        let index_key = key.index_key();
        match self.index.get(&index_key) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.index.insert(index_key, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Append an entry without touching the index. Returns the entry position.
    pub fn push_unindexed(&mut self, key: Value, value: Value) -> usize {
        self.needs_rehash = true;
        self.entries.push((key, value));
        self.entries.len() - 1
    }

    /// Remove an entry by position.
    pub fn remove_at(&mut self, idx: usize) -> Option<(Value, Value)> {
        if idx >= self.entries.len() {
            return None;
        }
        self.needs_rehash = true;
        Some(self.entries.remove(idx))
    }

    /// Rebuild the key index in one pass, dropping later duplicate keys.
    ///
    /// Returns the number of entries dropped.
    pub fn rehash(&mut self) -> usize {
        let before = self.entries.len();
        let mut index = HashMap::with_capacity(before);
        let mut kept = Vec::with_capacity(before);
        for (key, value) in self.entries.drain(..) {
            let index_key = key.index_key();
            if let std::collections::hash_map::Entry::Vacant(slot) = index.entry(index_key) {
                slot.insert(kept.len());
                kept.push((key, value));
            }
        }
        self.entries = kept;
        self.index = index;
        self.needs_rehash = false;
        before - self.entries.len()
    }

    /// Look a value up through the key index.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.index
            .get(&key.index_key())
            .and_then(|&idx| self.entries.get(idx))
            .map(|(_, v)| v)
    }

    /// Check if entries were appended since the last rehash.
    pub fn needs_rehash(&self) -> bool {
        self.needs_rehash
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.needs_rehash = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.entries.iter().all(|(k, v)| {
                other
                    .entries
                    .iter()
                    .any(|(ok, ov)| ok.index_key() == k.index_key() && ov == v)
            })
    }
}

/// One keyed row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Sanitized row key
    pub key: String,

    /// Field values of the row record
    pub record: Record,
}

impl Row {
    pub fn new(key: impl Into<String>, record: Record) -> Self {
        Self {
            key: key.into(),
            record,
        }
    }
}

/// Key-addressed rows, enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: Vec<Row>,
    row_map: HashMap<String, usize>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every row.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.row_map.clear();
    }

    /// Insert a row under a new key. Returns false if the key is taken.
    pub fn insert(&mut self, row: Row) -> bool {
        if self.row_map.contains_key(&row.key) {
            return false;
        }
        self.row_map.insert(row.key.clone(), self.rows.len());
        self.rows.push(row);
        true
    }

    /// Insert a row, replacing any row with the same key in place.
    pub fn replace(&mut self, row: Row) {
        match self.row_map.get(&row.key) {
            Some(&idx) => self.rows[idx] = row,
            None => {
                self.insert(row);
            }
        }
    }

    /// Get a row by key.
    pub fn find(&self, key: &str) -> Option<&Row> {
        self.row_map.get(key).and_then(|&idx| self.rows.get(idx))
    }

    /// Get a mutable row by key.
    pub fn find_mut(&mut self, key: &str) -> Option<&mut Row> {
        match self.row_map.get(key) {
            Some(&idx) => self.rows.get_mut(idx),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.row_map.contains_key(key)
    }

    /// Row keys in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }

    /// Rows in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Rows `[start, start + max_count)`, clipped to the store size.
    pub fn window(&self, start: usize, max_count: usize) -> &[Row] {
        if start >= self.rows.len() {
            return &[];
        }
        let end = start.saturating_add(max_count).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDef, FieldDescriptor};

    fn schemas() -> SchemaSet {
        SchemaSet::new(
            "Row",
            vec![
                RecordSchema::new(
                    "Vector",
                    vec![
                        FieldDescriptor::new("X", TypeTag::float()),
                        FieldDescriptor::new("Y", TypeTag::float()),
                    ],
                ),
                RecordSchema::new(
                    "Row",
                    vec![
                        FieldDescriptor::new("Count", TypeTag::int32()),
                        FieldDescriptor::new("Where", TypeTag::record("Vector")),
                        FieldDescriptor::new("Slots", TypeTag::Boolean).with_arity(3),
                        FieldDescriptor::new("Tint", TypeTag::enumeration("Color")),
                        FieldDescriptor::new("Tags", TypeTag::set(TypeTag::String)),
                    ],
                ),
            ],
            vec![EnumDef::sequential("Color", ["RED", "GREEN"])],
        )
    }

    #[test]
    fn test_default_record() {
        let schemas = schemas();
        let record = Record::default_for(schemas.row_schema().unwrap(), &schemas);

        assert_eq!(record.type_name(), "Row");
        assert_eq!(record.len(), 5);
        assert_eq!(record.get("Count"), Some(&Value::Int(0)));
        assert_eq!(
            record.get("Slots"),
            Some(&Value::Array(vec![Value::Bool(false); 3]))
        );
        assert_eq!(record.get("Tint"), Some(&Value::Enum(0)));

        let inner = record.get("Where").and_then(Value::as_record).unwrap();
        assert_eq!(inner.get("X"), Some(&Value::Float(0.0)));
        assert!(record.get("Tags").and_then(Value::as_set).unwrap().is_empty());
    }

    #[test]
    fn test_record_set_and_get() {
        let mut record = Record::empty("Thing");
        record.set("A", Value::Int(1));
        record.set("A", Value::Int(2));
        record.set("B", Value::Text("b".to_string()));
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("A"), Some(&Value::Int(2)));
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_set_is_unqueryable_until_rehash() {
        let mut set = ValueSet::new();
        set.push_unindexed(Value::Int(1));
        set.push_unindexed(Value::Int(2));
        set.push_unindexed(Value::Int(1));

        assert!(set.needs_rehash());
        assert!(!set.contains(&Value::Int(1)));

        assert_eq!(set.rehash(), 1);
        assert!(!set.needs_rehash());
        assert!(set.contains(&Value::Int(1)));
        assert!(set.contains(&Value::Int(2)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_insert_dedups() {
        let mut set = ValueSet::new();
        assert!(set.insert(Value::Text("a".to_string())));
        assert!(!set.insert(Value::Text("a".to_string())));
        assert!(set.insert(Value::Text("b".to_string())));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let mut a = ValueSet::new();
        a.insert(Value::Int(1));
        a.insert(Value::Int(2));
        let mut b = ValueSet::new();
        b.insert(Value::Int(2));
        b.insert(Value::Int(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_rehash_and_lookup() {
        let mut map = ValueMap::new();
        let first = map.push_unindexed(Value::Text("a".to_string()), Value::Int(1));
        map.push_unindexed(Value::Text("b".to_string()), Value::Int(2));
        assert_eq!(map.get(&Value::Text("a".to_string())), None);

        map.remove_at(first);
        assert_eq!(map.rehash(), 0);
        assert_eq!(map.get(&Value::Text("b".to_string())), Some(&Value::Int(2)));
        assert_eq!(map.get(&Value::Text("a".to_string())), None);

        map.insert(Value::Text("b".to_string()), Value::Int(3));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Value::Text("b".to_string())), Some(&Value::Int(3)));
    }

    #[test]
    fn test_index_key_distinguishes_types() {
        assert_ne!(Value::Int(1).index_key(), Value::Enum(1).index_key());
        assert_ne!(
            Value::Text("1".to_string()).index_key(),
            Value::Int(1).index_key()
        );
        assert_ne!(Value::Float(0.0).index_key(), Value::Float(-0.0).index_key());
    }

    #[test]
    fn test_row_store_ordering_and_lookup() {
        let mut store = RowStore::new();
        assert!(store.insert(Row::new("b", Record::empty("Row"))));
        assert!(store.insert(Row::new("a", Record::empty("Row"))));
        assert!(!store.insert(Row::new("b", Record::empty("Other"))));

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(store.find("b").unwrap().record.type_name(), "Row");

        store.replace(Row::new("b", Record::empty("Other")));
        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(store.find("b").unwrap().record.type_name(), "Other");

        store.clear();
        assert!(store.is_empty());
        assert!(store.find("a").is_none());
    }

    #[test]
    fn test_row_store_window() {
        let mut store = RowStore::new();
        for i in 0..10 {
            store.insert(Row::new(format!("row{i}"), Record::empty("Row")));
        }

        let window = store.window(7, 5);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].key, "row7");
        assert_eq!(window[2].key, "row9");

        assert!(store.window(10, 5).is_empty());
        assert!(store.window(99, 5).is_empty());
        assert_eq!(store.window(0, usize::MAX).len(), 10);
    }
}
