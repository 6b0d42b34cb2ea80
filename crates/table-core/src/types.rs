//! Type tags for the datatable-sync marshaling engine.
//!
//! This module defines `TypeTag`, the closed set of field kinds that drives
//! every dispatch site in import and export. Adding a variant forces every
//! `match` over it to be revisited.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Storage width of an integer (or of an enum's underlying integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bits.
    pub fn bits(self) -> u8 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    /// Look up a width by its bit count.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::W8),
            16 => Some(Self::W16),
            32 => Some(Self::W32),
            64 => Some(Self::W64),
            _ => None,
        }
    }

    /// Truncate (or sign/zero-extend) `value` to this width.
    ///
    /// The result is always reported back as an `i64`, matching the signed
    /// 64-bit range used on export.
    pub fn truncate(self, value: i64, signed: bool) -> i64 {
        match (self, signed) {
            (Self::W8, true) => value as i8 as i64,
            (Self::W8, false) => value as u8 as i64,
            (Self::W16, true) => value as i16 as i64,
            (Self::W16, false) => value as u16 as i64,
            (Self::W32, true) => value as i32 as i64,
            (Self::W32, false) => value as u32 as i64,
            (Self::W64, _) => value,
        }
    }
}

/// Storage width of a floating point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    /// Narrow `value` to this width, keeping it in an `f64` slot.
    pub fn narrow(self, value: f64) -> f64 {
        match self {
            Self::F32 => value as f32 as f64,
            Self::F64 => value,
        }
    }
}

/// Marshaling kind of one field or container element.
///
/// # YAML Format
///
/// Simple types can be specified as strings:
/// ```yaml
/// type: int32
/// type: bool
/// type: datetime
/// ```
///
/// Complex types use object format:
/// ```yaml
/// type:
///   type: enum
///   enum: Color
/// type:
///   type: array
///   element: int32
/// type:
///   type: map
///   key: string
///   value:
///     type: record
///     record: Vector
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TypeTag {
    /// Named enum stored as an integer of the given width.
    Enum { enum_name: String, width: IntWidth },

    /// Integer, optionally backed by an enum name table.
    Integer {
        width: IntWidth,
        signed: bool,
        enum_name: Option<String>,
    },

    /// Floating point number, optionally backed by an enum name table.
    Float {
        width: FloatWidth,
        enum_name: Option<String>,
    },

    Boolean,

    String,

    /// Growable array of elements.
    DynamicArray(Box<TypeTag>),

    /// Unordered collection of unique elements.
    Set(Box<TypeTag>),

    /// Key/value container.
    Map {
        key: Box<TypeTag>,
        value: Box<TypeTag>,
    },

    /// Nested record, referenced by record schema name.
    Record(String),

    /// Free-form value type handled entirely by the coercion registry.
    ///
    /// Unregistered custom types keep their text verbatim.
    Custom(String),
}

/// Custom type names that may be written as plain strings in YAML.
const SIMPLE_CUSTOM_NAMES: &[&str] = &["datetime", "guid", "name", "text"];

impl TypeTag {
    pub fn int8() -> Self {
        Self::integer(IntWidth::W8, true)
    }

    pub fn int16() -> Self {
        Self::integer(IntWidth::W16, true)
    }

    pub fn int32() -> Self {
        Self::integer(IntWidth::W32, true)
    }

    pub fn int64() -> Self {
        Self::integer(IntWidth::W64, true)
    }

    pub fn uint8() -> Self {
        Self::integer(IntWidth::W8, false)
    }

    pub fn uint32() -> Self {
        Self::integer(IntWidth::W32, false)
    }

    /// Plain integer of the given width and signedness.
    pub fn integer(width: IntWidth, signed: bool) -> Self {
        Self::Integer {
            width,
            signed,
            enum_name: None,
        }
    }

    /// Byte-sized integer that carries the symbolic names of `enum_name`.
    pub fn enum_backed_byte(enum_name: impl Into<String>) -> Self {
        Self::Integer {
            width: IntWidth::W8,
            signed: false,
            enum_name: Some(enum_name.into()),
        }
    }

    pub fn float() -> Self {
        Self::Float {
            width: FloatWidth::F32,
            enum_name: None,
        }
    }

    pub fn double() -> Self {
        Self::Float {
            width: FloatWidth::F64,
            enum_name: None,
        }
    }

    /// Enum with a byte-sized underlying integer.
    pub fn enumeration(enum_name: impl Into<String>) -> Self {
        Self::Enum {
            enum_name: enum_name.into(),
            width: IntWidth::W8,
        }
    }

    pub fn array(element: TypeTag) -> Self {
        Self::DynamicArray(Box::new(element))
    }

    pub fn set(element: TypeTag) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: TypeTag, value: TypeTag) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::Record(name.into())
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Check if this tag is a dynamic container (array, set or map).
    pub fn is_container(&self) -> bool {
        matches!(self, Self::DynamicArray(_) | Self::Set(_) | Self::Map { .. })
    }

    /// Name of the enum whose name table applies to this tag, if any.
    pub fn enum_backing(&self) -> Option<&str> {
        match self {
            Self::Enum { enum_name, .. } => Some(enum_name),
            Self::Integer { enum_name, .. } | Self::Float { enum_name, .. } => {
                enum_name.as_deref()
            }
            _ => None,
        }
    }

    /// Element tags held directly by this tag (empty for non-containers).
    pub fn element_types(&self) -> Vec<&TypeTag> {
        match self {
            Self::DynamicArray(element) | Self::Set(element) => vec![element.as_ref()],
            Self::Map { key, value } => vec![key.as_ref(), value.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Short human-readable name, also the lookup key of the coercion registry.
    pub fn type_name(&self) -> String {
        match self {
            Self::Enum { enum_name, .. } => enum_name.clone(),
            Self::Integer { width, signed, .. } => {
                let prefix = if *signed { "int" } else { "uint" };
                format!("{prefix}{}", width.bits())
            }
            Self::Float {
                width: FloatWidth::F32,
                ..
            } => "float".to_string(),
            Self::Float {
                width: FloatWidth::F64,
                ..
            } => "double".to_string(),
            Self::Boolean => "bool".to_string(),
            Self::String => "string".to_string(),
            Self::DynamicArray(_) => "array".to_string(),
            Self::Set(_) => "set".to_string(),
            Self::Map { .. } => "map".to_string(),
            Self::Record(name) | Self::Custom(name) => name.clone(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DynamicArray(element) => write!(f, "array<{element}>"),
            Self::Set(element) => write!(f, "set<{element}>"),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
            other => f.write_str(&other.type_name()),
        }
    }
}

fn parse_simple(value: &str) -> Option<TypeTag> {
    let tag = match value {
        "bool" | "boolean" => TypeTag::Boolean,
        "string" | "str" => TypeTag::String,
        "int8" => TypeTag::integer(IntWidth::W8, true),
        "int16" => TypeTag::integer(IntWidth::W16, true),
        "int32" | "int" => TypeTag::integer(IntWidth::W32, true),
        "int64" => TypeTag::integer(IntWidth::W64, true),
        "uint8" | "byte" => TypeTag::integer(IntWidth::W8, false),
        "uint16" => TypeTag::integer(IntWidth::W16, false),
        "uint32" => TypeTag::integer(IntWidth::W32, false),
        "uint64" => TypeTag::integer(IntWidth::W64, false),
        "float" => TypeTag::float(),
        "double" => TypeTag::double(),
        custom if SIMPLE_CUSTOM_NAMES.contains(&custom) => TypeTag::Custom(custom.to_string()),
        _ => return None,
    };
    Some(tag)
}

// Custom serialization/deserialization for TypeTag
// Supports both simple string format ("int32", "bool") and object format ({"type": "enum", "enum": "Color"})

impl Serialize for TypeTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Self::Boolean
            | Self::String
            | Self::Integer {
                enum_name: None, ..
            }
            | Self::Float {
                enum_name: None, ..
            } => serializer.serialize_str(&self.type_name()),
            Self::Custom(name) if SIMPLE_CUSTOM_NAMES.contains(&name.as_str()) => {
                serializer.serialize_str(name)
            }

            Self::Integer {
                enum_name: Some(enum_name),
                ..
            }
            | Self::Float {
                enum_name: Some(enum_name),
                ..
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", &self.type_name())?;
                map.serialize_entry("enum", enum_name)?;
                map.end()
            }
            Self::Enum { enum_name, width } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "enum")?;
                map.serialize_entry("enum", enum_name)?;
                map.serialize_entry("width", &width.bits())?;
                map.end()
            }
            Self::DynamicArray(element) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("element", element)?;
                map.end()
            }
            Self::Set(element) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "set")?;
                map.serialize_entry("element", element)?;
                map.end()
            }
            Self::Map { key, value } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "map")?;
                map.serialize_entry("key", key)?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Self::Record(name) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "record")?;
                map.serialize_entry("record", name)?;
                map.end()
            }
            Self::Custom(name) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "custom")?;
                map.serialize_entry("name", name)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, Visitor};

        struct TypeTagVisitor;

        impl<'de> Visitor<'de> for TypeTagVisitor {
            type Value = TypeTag;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or map representing a TypeTag")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                parse_simple(value).ok_or_else(|| E::custom(format!("unknown simple type: {value}")))
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut type_name: Option<String> = None;
                let mut fields: HashMap<String, serde_yaml::Value> = HashMap::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "type" {
                        type_name = Some(map.next_value()?);
                    } else {
                        fields.insert(key, map.next_value()?);
                    }
                }

                let type_name = type_name.ok_or_else(|| M::Error::missing_field("type"))?;

                match type_name.as_str() {
                    "enum" => {
                        let enum_name: String = get_field_required(&fields, "enum")?;
                        let bits: u8 = get_field(&fields, "width").unwrap_or(8);
                        let width = IntWidth::from_bits(bits).ok_or_else(|| {
                            M::Error::custom(format!("invalid enum width: {bits}"))
                        })?;
                        Ok(TypeTag::Enum { enum_name, width })
                    }
                    "array" => {
                        let element: TypeTag = get_field_required(&fields, "element")?;
                        Ok(TypeTag::array(element))
                    }
                    "set" => {
                        let element: TypeTag = get_field_required(&fields, "element")?;
                        Ok(TypeTag::set(element))
                    }
                    "map" => {
                        let key: TypeTag = get_field_required(&fields, "key")?;
                        let value: TypeTag = get_field_required(&fields, "value")?;
                        Ok(TypeTag::map(key, value))
                    }
                    "record" => {
                        let name: String = get_field_required(&fields, "record")?;
                        Ok(TypeTag::Record(name))
                    }
                    "custom" => {
                        let name: String = get_field_required(&fields, "name")?;
                        Ok(TypeTag::Custom(name))
                    }
                    simple => {
                        let mut tag = parse_simple(simple)
                            .ok_or_else(|| M::Error::custom(format!("unknown type: {simple}")))?;
                        let backing: Option<String> = get_field(&fields, "enum");
                        let backed = backing.is_some();
                        match &mut tag {
                            TypeTag::Integer { enum_name, .. } | TypeTag::Float { enum_name, .. } => {
                                *enum_name = backing;
                            }
                            _ if backed => {
                                return Err(M::Error::custom(format!(
                                    "type '{simple}' cannot be enum-backed"
                                )));
                            }
                            _ => {}
                        }
                        Ok(tag)
                    }
                }
            }
        }

        deserializer.deserialize_any(TypeTagVisitor)
    }
}

// Helper functions for deserialization
fn get_field<T: for<'de> Deserialize<'de>>(
    fields: &HashMap<String, serde_yaml::Value>,
    key: &str,
) -> Option<T> {
    fields
        .get(key)
        .and_then(|v| serde_yaml::from_value(v.clone()).ok())
}

fn get_field_required<T: for<'de> Deserialize<'de>, E: serde::de::Error>(
    fields: &HashMap<String, serde_yaml::Value>,
    key: &'static str,
) -> Result<T, E> {
    let value = fields.get(key).ok_or_else(|| E::missing_field(key))?;
    serde_yaml::from_value(value.clone())
        .map_err(|e| E::custom(format!("invalid field '{key}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(IntWidth::W8.truncate(300, false), 44);
        assert_eq!(IntWidth::W8.truncate(200, true), -56);
        assert_eq!(IntWidth::W16.truncate(-1, false), 65535);
        assert_eq!(IntWidth::W64.truncate(i64::MIN, true), i64::MIN);
    }

    #[test]
    fn test_float_narrowing() {
        let narrowed = FloatWidth::F32.narrow(0.1);
        assert_ne!(narrowed, 0.1);
        assert_eq!(narrowed, 0.1f32 as f64);
        assert_eq!(FloatWidth::F64.narrow(0.1), 0.1);
    }

    #[test]
    fn test_enum_backing() {
        assert_eq!(TypeTag::enumeration("Color").enum_backing(), Some("Color"));
        assert_eq!(TypeTag::enum_backed_byte("Color").enum_backing(), Some("Color"));
        assert_eq!(TypeTag::int32().enum_backing(), None);
        assert_eq!(TypeTag::String.enum_backing(), None);
    }

    #[test]
    fn test_container_detection() {
        assert!(TypeTag::array(TypeTag::int32()).is_container());
        assert!(TypeTag::set(TypeTag::String).is_container());
        assert!(TypeTag::map(TypeTag::String, TypeTag::Boolean).is_container());
        assert!(!TypeTag::record("Vector").is_container());
    }

    #[test]
    fn test_deserialize_simple_string() {
        let parsed: TypeTag = serde_yaml::from_str("int32").unwrap();
        assert_eq!(parsed, TypeTag::int32());

        let parsed: TypeTag = serde_yaml::from_str("bool").unwrap();
        assert_eq!(parsed, TypeTag::Boolean);

        let parsed: TypeTag = serde_yaml::from_str("datetime").unwrap();
        assert_eq!(parsed, TypeTag::custom("datetime"));

        assert!(serde_yaml::from_str::<TypeTag>("decimal").is_err());
    }

    #[test]
    fn test_deserialize_complex_types() {
        let yaml = r#"
type: map
key: string
value:
  type: record
  record: Vector
"#;
        let parsed: TypeTag = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed,
            TypeTag::map(TypeTag::String, TypeTag::record("Vector"))
        );

        let yaml = r#"
type: enum
enum: Color
width: 32
"#;
        let parsed: TypeTag = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed,
            TypeTag::Enum {
                enum_name: "Color".to_string(),
                width: IntWidth::W32
            }
        );

        let yaml = r#"
type: uint8
enum: Color
"#;
        let parsed: TypeTag = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed, TypeTag::enum_backed_byte("Color"));
    }

    #[test]
    fn test_enum_backing_rejected_on_strings() {
        let yaml = r#"
type: string
enum: Color
"#;
        let err = serde_yaml::from_str::<TypeTag>(yaml).unwrap_err();
        assert!(err.to_string().contains("cannot be enum-backed"));
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let types = vec![
            TypeTag::Boolean,
            TypeTag::uint8(),
            TypeTag::enum_backed_byte("Color"),
            TypeTag::double(),
            TypeTag::enumeration("Color"),
            TypeTag::array(TypeTag::record("Vector")),
            TypeTag::set(TypeTag::String),
            TypeTag::map(TypeTag::int32(), TypeTag::custom("guid")),
            TypeTag::custom("Color3"),
        ];

        for ty in types {
            let yaml = serde_yaml::to_string(&ty).unwrap();
            let parsed: TypeTag = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(ty, parsed);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TypeTag::map(TypeTag::String, TypeTag::array(TypeTag::int64())).to_string(),
            "map<string, array<int64>>"
        );
    }
}
