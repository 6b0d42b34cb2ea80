//! String ↔ value coercions, looked up per type name.
//!
//! The registry holds one [`Coercion`] per record or custom type name. Types
//! without a registered coercion use the generic text form from
//! [`crate::text`].

use crate::schema::SchemaSet;
use crate::text;
use crate::types::TypeTag;
use crate::values::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Error returned when text cannot be coerced into a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CoercionError {
    pub message: String,
}

impl CoercionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Conversion between one type's text form and its value.
pub trait Coercion: Send + Sync {
    /// Parse text into a value.
    fn parse(&self, text: &str) -> Result<Value, CoercionError>;

    /// Render a value as text accepted by [`Coercion::parse`].
    fn format(&self, value: &Value) -> String;
}

/// Coercions keyed by record or custom type name.
pub struct CoercionRegistry {
    coercions: HashMap<String, Box<dyn Coercion>>,
}

impl CoercionRegistry {
    /// Create a registry with no coercions.
    pub fn new() -> Self {
        Self {
            coercions: HashMap::new(),
        }
    }

    /// Create a registry holding the `datetime` and `guid` coercions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("datetime", DateTimeCoercion);
        registry.register("guid", GuidCoercion);
        registry
    }

    /// Register (or replace) the coercion for a type name.
    pub fn register(&mut self, type_name: impl Into<String>, coercion: impl Coercion + 'static) {
        self.coercions.insert(type_name.into(), Box::new(coercion));
    }

    /// Get the coercion registered for a type name.
    pub fn get(&self, type_name: &str) -> Option<&dyn Coercion> {
        self.coercions.get(type_name).map(|c| c.as_ref())
    }

    /// Coercion applying to `tag`, if any. Only record and custom types are
    /// looked up.
    pub fn lookup(&self, tag: &TypeTag) -> Option<&dyn Coercion> {
        match tag {
            TypeTag::Record(name) | TypeTag::Custom(name) => self.get(name),
            _ => None,
        }
    }

    /// Parse text into a value of type `tag`.
    pub fn parse(&self, text: &str, tag: &TypeTag, schemas: &SchemaSet) -> Result<Value, CoercionError> {
        text::parse_value(text, tag, schemas, self)
    }

    /// Render a value of type `tag` as text.
    pub fn format(&self, value: &Value, tag: &TypeTag, schemas: &SchemaSet) -> String {
        text::format_value(value, tag, schemas, self)
    }
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.coercions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CoercionRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Timestamps in RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` form, read as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeCoercion;

impl Coercion for DateTimeCoercion {
    fn parse(&self, text: &str) -> Result<Value, CoercionError> {
        let s = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Value::DateTime(dt.with_timezone(&Utc)));
        }
        for format in [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
        ] {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Value::DateTime(Utc.from_utc_datetime(&ndt)));
            }
        }
        if let Some(ndt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Value::DateTime(Utc.from_utc_datetime(&ndt)));
        }
        Err(CoercionError::new(format!("invalid datetime '{s}'")))
    }

    fn format(&self, value: &Value) -> String {
        match value {
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Text(s) => s.clone(),
            _ => String::new(),
        }
    }
}

/// Hyphenated GUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidCoercion;

impl Coercion for GuidCoercion {
    fn parse(&self, text: &str) -> Result<Value, CoercionError> {
        let s = text.trim();
        Uuid::parse_str(s)
            .map(Value::Guid)
            .map_err(|e| CoercionError::new(format!("invalid guid '{s}': {e}")))
    }

    fn format(&self, value: &Value) -> String {
        match value {
            Value::Guid(g) => g.to_string(),
            Value::Text(s) => s.clone(),
            _ => String::new(),
        }
    }
}
