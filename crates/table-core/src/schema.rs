//! Schema definitions for datatable-sync.
//!
//! ## Type Hierarchy
//!
//! - `FieldDescriptor` - one typed field of a record, with its import aliases
//! - `RecordSchema` - ordered fields of one (possibly nested) record type
//! - `EnumDef` - symbolic name table of one enum type
//! - `SchemaSet` - every record and enum reachable from a table's row record
//!
//! Schema files are YAML:
//!
//! ```yaml
//! row: Item
//! key_field: Name
//! enums:
//!   - name: Color
//!     values: [RED, GREEN, BLUE]
//! records:
//!   - name: Item
//!     fields:
//!       - name: Price
//!         type: int32
//!         aliases: [Price, Cost]
//!       - name: Tint
//!         type: { type: enum, enum: Color }
//! ```

use crate::types::TypeTag;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Record type not found in schema set
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Enum type not found in schema set
    #[error("Enum '{enum_name}' referenced by field '{field}' in record '{record}' not found")]
    EnumNotFound {
        record: String,
        field: String,
        enum_name: String,
    },

    /// Record type referenced by a field not found in schema set
    #[error("Record '{target}' referenced by field '{field}' in record '{record}' not found")]
    RecordRefNotFound {
        record: String,
        field: String,
        target: String,
    },

    /// Container whose element type is itself a container
    #[error("Field '{field}' in record '{record}' nests containers: {field_type}")]
    NestedContainer {
        record: String,
        field: String,
        field_type: String,
    },

    /// Implicitly numbered enum name following `i64::MAX`
    #[error("Enum '{enum_name}' has no value left for '{variant}'")]
    EnumValueOverflow { enum_name: String, variant: String },

    /// Fixed arity of zero
    #[error("Field '{field}' in record '{record}' has a fixed arity of 0")]
    ZeroArity { record: String, field: String },

    /// Two fields sharing one canonical name
    #[error("Duplicate field '{field}' in record '{record}'")]
    DuplicateField { record: String, field: String },

    /// Record that contains itself through non-container fields
    #[error("Record '{0}' contains itself")]
    RecursiveRecord(String),
}

// ============================================================================
// Fields and Records
// ============================================================================

fn default_arity() -> usize {
    1
}

/// One typed field of a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    /// Canonical name; also the export column id
    pub name: String,

    /// Names accepted on import, tried in order. Empty means `[name]`.
    #[serde(default, rename = "aliases", skip_serializing_if = "Vec::is_empty")]
    pub import_aliases: Vec<String>,

    /// Field type
    #[serde(rename = "type")]
    pub field_type: TypeTag,

    /// Fixed number of slots; 1 for a scalar field
    #[serde(default = "default_arity")]
    pub arity: usize,

    /// Whether a missing value is silently accepted on import
    #[serde(default)]
    pub optional: bool,
}

impl FieldDescriptor {
    /// Create a scalar field imported under its own name.
    pub fn new(name: impl Into<String>, field_type: TypeTag) -> Self {
        Self {
            name: name.into(),
            import_aliases: Vec::new(),
            field_type,
            arity: 1,
            optional: false,
        }
    }

    /// Replace the import alias list.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.import_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Turn this field into a fixed-size array of `arity` slots.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    /// Mark this field optional for import.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Names tried, in order, when looking the field up in a JSON object.
    pub fn import_names(&self) -> Vec<&str> {
        if self.import_aliases.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.import_aliases.iter().map(String::as_str).collect()
        }
    }

    /// Check if a JSON key names this field, either canonically or by alias.
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.import_aliases.iter().any(|alias| alias == key)
    }

    /// Check if this field is a fixed-size array.
    pub fn is_fixed_array(&self) -> bool {
        self.arity > 1
    }
}

/// Ordered fields of one record type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSchema {
    /// Record type name
    pub name: String,

    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Create a new record schema.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Get a field by canonical name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a field by canonical name, ignoring letter case.
    pub fn field_ignore_case(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field(name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Get all field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

// ============================================================================
// Enums
// ============================================================================

/// One symbolic name of an enum and its underlying integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VariantSpec {
    Explicit { name: String, value: i64 },
    Implicit(String),
}

#[derive(Deserialize)]
struct EnumDefSpec {
    name: String,
    values: Vec<VariantSpec>,
}

impl TryFrom<EnumDefSpec> for EnumDef {
    type Error = SchemaError;

    fn try_from(spec: EnumDefSpec) -> Result<Self, Self::Error> {
        // None once the previous value was i64::MAX
        let mut next = Some(0i64);
        let mut variants = Vec::with_capacity(spec.values.len());
        for v in spec.values {
            let variant = match v {
                VariantSpec::Explicit { name, value } => EnumVariant { name, value },
                VariantSpec::Implicit(name) => match next {
                    Some(value) => EnumVariant { name, value },
                    None => {
                        return Err(SchemaError::EnumValueOverflow {
                            enum_name: spec.name,
                            variant: name,
                        })
                    }
                },
            };
            next = variant.value.checked_add(1);
            variants.push(variant);
        }
        Ok(EnumDef {
            name: spec.name,
            variants,
        })
    }
}

/// Name table of one enum type.
///
/// In YAML, `values` may list bare names (numbered from the previous value
/// plus one, starting at 0) or `{name, value}` pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "EnumDefSpec")]
pub struct EnumDef {
    pub name: String,
    #[serde(rename = "values")]
    pub variants: Vec<EnumVariant>,
}

impl EnumDef {
    /// Create an enum whose names are numbered 0, 1, 2, ...
    pub fn sequential<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: names
                .into_iter()
                .enumerate()
                .map(|(i, n)| EnumVariant {
                    name: n.into(),
                    value: i as i64,
                })
                .collect(),
        }
    }

    /// Resolve a symbolic name to its underlying integer.
    ///
    /// Accepts bare (`RED`) and qualified (`Color::RED`) names; an exact match
    /// wins over a case-insensitive one.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        let bare = name
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(name);
        self.variants
            .iter()
            .find(|v| v.name == bare)
            .or_else(|| self.variants.iter().find(|v| v.name.eq_ignore_ascii_case(bare)))
            .map(|v| v.value)
    }

    /// Resolve an underlying integer to its symbolic name.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

// ============================================================================
// Schema Set
// ============================================================================

fn default_row() -> String {
    "Row".to_string()
}

/// Every record and enum type used by one table, plus the table's row record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSet {
    /// Name of the record describing a whole row
    #[serde(default = "default_row")]
    pub row: String,

    /// JSON field holding each row's key on import (`Name` when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,

    /// Row field exported outside the cell list (`_path` when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_field: Option<String>,

    /// Record types
    #[serde(default)]
    pub records: Vec<RecordSchema>,

    /// Enum types
    #[serde(default)]
    pub enums: Vec<EnumDef>,

    /// Cached record lookup (not serialized)
    #[serde(skip)]
    record_map: HashMap<String, usize>,

    /// Cached enum lookup (not serialized)
    #[serde(skip)]
    enum_map: HashMap<String, usize>,
}

impl SchemaSet {
    /// Create a schema set without validating it.
    pub fn new(row: impl Into<String>, records: Vec<RecordSchema>, enums: Vec<EnumDef>) -> Self {
        let mut schemas = Self {
            row: row.into(),
            key_field: None,
            path_field: None,
            records,
            enums,
            record_map: HashMap::new(),
            enum_map: HashMap::new(),
        };
        schemas.build_maps();
        schemas
    }

    /// Set the key field used on import.
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    /// Set the field exported as the row path.
    pub fn with_path_field(mut self, path_field: impl Into<String>) -> Self {
        self.path_field = Some(path_field.into());
        self
    }

    /// Load and validate a schema set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a schema set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let mut schemas: SchemaSet = serde_yaml::from_str(yaml)?;
        schemas.build_maps();
        schemas.validate()?;
        Ok(schemas)
    }

    /// Build the internal lookup maps.
    fn build_maps(&mut self) {
        self.record_map = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.name.clone(), idx))
            .collect();
        self.enum_map = self
            .enums
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.name.clone(), idx))
            .collect();
    }

    /// Get a record schema by name.
    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.record_map
            .get(name)
            .and_then(|&idx| self.records.get(idx))
    }

    /// Get an enum definition by name.
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enum_map.get(name).and_then(|&idx| self.enums.get(idx))
    }

    /// Get the row record schema.
    pub fn row_schema(&self) -> Option<&RecordSchema> {
        self.record(&self.row)
    }

    /// Get the key field name, defaulting to `Name`.
    pub fn key_field_name(&self) -> &str {
        match self.key_field.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Name",
        }
    }

    /// Get the path field name, defaulting to `_path`.
    pub fn path_field_name(&self) -> &str {
        match self.path_field.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "_path",
        }
    }

    /// Add a record type.
    pub fn add_record(&mut self, record: RecordSchema) {
        let idx = self.records.len();
        self.record_map.insert(record.name.clone(), idx);
        self.records.push(record);
    }

    /// Add an enum type.
    pub fn add_enum(&mut self, def: EnumDef) {
        let idx = self.enums.len();
        self.enum_map.insert(def.name.clone(), idx);
        self.enums.push(def);
    }

    /// Check every record for construction errors.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.row_schema().is_none() {
            return Err(SchemaError::RecordNotFound(self.row.clone()));
        }

        for record in &self.records {
            let mut seen = HashSet::new();
            for field in &record.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        record: record.name.clone(),
                        field: field.name.clone(),
                    });
                }
                if field.arity == 0 {
                    return Err(SchemaError::ZeroArity {
                        record: record.name.clone(),
                        field: field.name.clone(),
                    });
                }
                self.validate_tag(&record.name, &field.name, &field.field_type)?;
                for element in field.field_type.element_types() {
                    if element.is_container() {
                        return Err(SchemaError::NestedContainer {
                            record: record.name.clone(),
                            field: field.name.clone(),
                            field_type: field.field_type.to_string(),
                        });
                    }
                }
            }
        }

        for record in &self.records {
            self.check_not_recursive(&record.name, &record.name, &mut Vec::new())?;
        }

        Ok(())
    }

    fn validate_tag(&self, record: &str, field: &str, tag: &TypeTag) -> Result<(), SchemaError> {
        if let Some(enum_name) = tag.enum_backing() {
            if self.enum_def(enum_name).is_none() {
                return Err(SchemaError::EnumNotFound {
                    record: record.to_string(),
                    field: field.to_string(),
                    enum_name: enum_name.to_string(),
                });
            }
        }
        if let TypeTag::Record(target) = tag {
            if self.record(target).is_none() {
                return Err(SchemaError::RecordRefNotFound {
                    record: record.to_string(),
                    field: field.to_string(),
                    target: target.clone(),
                });
            }
        }
        for element in tag.element_types() {
            self.validate_tag(record, field, element)?;
        }
        Ok(())
    }

    /// Records reached through plain record fields must not loop back, or
    /// default-initializing a row would never terminate.
    fn check_not_recursive(
        &self,
        origin: &str,
        current: &str,
        visiting: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        let Some(record) = self.record(current) else {
            return Ok(());
        };
        visiting.push(current.to_string());
        for field in &record.fields {
            if let TypeTag::Record(target) = &field.field_type {
                if target == origin {
                    return Err(SchemaError::RecursiveRecord(origin.to_string()));
                }
                if !visiting.iter().any(|v| v == target) {
                    self.check_not_recursive(origin, target, visiting)?;
                }
            }
        }
        visiting.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM_SCHEMA: &str = r#"
row: Item
key_field: Id
enums:
  - name: Color
    values: [RED, GREEN, { name: BLUE, value: 10 }, PURPLE]
records:
  - name: Vector
    fields:
      - { name: X, type: float }
      - { name: Y, type: float }
  - name: Item
    fields:
      - name: Price
        type: int32
        aliases: [Price, Cost]
      - name: Tint
        type: { type: enum, enum: Color }
      - name: Offsets
        type: { type: record, record: Vector }
        arity: 2
      - name: Tags
        type: { type: set, element: string }
        optional: true
"#;

    #[test]
    fn test_parse_schema_yaml() {
        let schemas = SchemaSet::from_yaml(ITEM_SCHEMA).unwrap();
        assert_eq!(schemas.row, "Item");
        assert_eq!(schemas.key_field_name(), "Id");

        let item = schemas.row_schema().unwrap();
        assert_eq!(item.field_names(), vec!["Price", "Tint", "Offsets", "Tags"]);

        let price = item.field("Price").unwrap();
        assert_eq!(price.import_names(), vec!["Price", "Cost"]);
        assert!(price.answers_to("Cost"));

        let offsets = item.field("Offsets").unwrap();
        assert!(offsets.is_fixed_array());
        assert!(item.field("Tags").unwrap().optional);
    }

    #[test]
    fn test_enum_numbering() {
        let schemas = SchemaSet::from_yaml(ITEM_SCHEMA).unwrap();
        let color = schemas.enum_def("Color").unwrap();
        assert_eq!(color.value_of("RED"), Some(0));
        assert_eq!(color.value_of("GREEN"), Some(1));
        assert_eq!(color.value_of("BLUE"), Some(10));
        assert_eq!(color.value_of("PURPLE"), Some(11));
        assert_eq!(color.name_of(10), Some("BLUE"));
        assert_eq!(color.name_of(3), None);
    }

    #[test]
    fn test_enum_numbering_past_max_is_error() {
        let yaml = |values: &str| {
            format!("row: Row\nrecords:\n  - name: Row\n    fields: []\nenums:\n  - name: Big\n    values: {values}\n")
        };

        let schemas =
            SchemaSet::from_yaml(&yaml("[A, {name: B, value: 9223372036854775807}]")).unwrap();
        assert_eq!(schemas.enum_def("Big").unwrap().value_of("B"), Some(i64::MAX));

        let err = SchemaSet::from_yaml(&yaml("[{name: A, value: 9223372036854775807}, B]"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::YamlError(_)));
        assert!(err.to_string().contains("Enum 'Big' has no value left for 'B'"));
    }

    #[test]
    fn test_enum_qualified_and_case_insensitive_names() {
        let color = EnumDef::sequential("Color", ["RED", "GREEN"]);
        assert_eq!(color.value_of("Color::GREEN"), Some(1));
        assert_eq!(color.value_of("green"), Some(1));
        assert_eq!(color.value_of("Colour::GREEN"), None);
        assert_eq!(color.value_of("YELLOW"), None);
    }

    #[test]
    fn test_default_import_names() {
        let field = FieldDescriptor::new("Score", TypeTag::int32());
        assert_eq!(field.import_names(), vec!["Score"]);
        assert!(!field.is_fixed_array());
    }

    #[test]
    fn test_key_field_defaults_to_name() {
        let schemas = SchemaSet::new("Row", vec![RecordSchema::new("Row", vec![])], vec![]);
        assert_eq!(schemas.key_field_name(), "Name");
        assert_eq!(schemas.path_field_name(), "_path");

        let schemas = schemas.with_key_field("").with_path_field("Folder");
        assert_eq!(schemas.key_field_name(), "Name");
        assert_eq!(schemas.path_field_name(), "Folder");
    }

    #[test]
    fn test_missing_row_record() {
        let yaml = "row: Missing\nrecords: []\n";
        let err = SchemaSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::RecordNotFound(name) if name == "Missing"));
    }

    #[test]
    fn test_nested_container_rejected() {
        let yaml = r#"
row: Row
records:
  - name: Row
    fields:
      - name: Grid
        type: { type: array, element: { type: array, element: int32 } }
"#;
        let err = SchemaSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::NestedContainer { .. }));
        assert!(err.to_string().contains("array<array<int32>>"));
    }

    #[test]
    fn test_unknown_references_rejected() {
        let yaml = r#"
row: Row
records:
  - name: Row
    fields:
      - { name: Tint, type: { type: enum, enum: Color } }
"#;
        let err = SchemaSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::EnumNotFound { .. }));

        let yaml = r#"
row: Row
records:
  - name: Row
    fields:
      - { name: Where, type: { type: set, element: { type: record, record: Vector } } }
"#;
        let err = SchemaSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::RecordRefNotFound { .. }));
    }

    #[test]
    fn test_zero_arity_and_duplicates_rejected() {
        let mut schemas = SchemaSet::new(
            "Row",
            vec![RecordSchema::new(
                "Row",
                vec![FieldDescriptor::new("A", TypeTag::Boolean).with_arity(0)],
            )],
            vec![],
        );
        assert!(matches!(
            schemas.validate(),
            Err(SchemaError::ZeroArity { .. })
        ));

        schemas.records[0].fields = vec![
            FieldDescriptor::new("A", TypeTag::Boolean),
            FieldDescriptor::new("A", TypeTag::String),
        ];
        assert!(matches!(
            schemas.validate(),
            Err(SchemaError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_recursive_record_rejected() {
        let schemas = SchemaSet::new(
            "Node",
            vec![
                RecordSchema::new(
                    "Node",
                    vec![FieldDescriptor::new("Inner", TypeTag::record("Wrapper"))],
                ),
                RecordSchema::new(
                    "Wrapper",
                    vec![FieldDescriptor::new("Back", TypeTag::record("Node"))],
                ),
            ],
            vec![],
        );
        assert!(matches!(
            schemas.validate(),
            Err(SchemaError::RecursiveRecord(_))
        ));

        // Going through a container is fine: containers default to empty.
        let schemas = SchemaSet::new(
            "Node",
            vec![RecordSchema::new(
                "Node",
                vec![FieldDescriptor::new(
                    "Children",
                    TypeTag::array(TypeTag::record("Node")),
                )],
            )],
            vec![],
        );
        assert!(schemas.validate().is_ok());
    }
}
