//! Import and export policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use table_core::SchemaSet;

/// What to do with a row whose key is already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Discard the later row and record a diagnostic.
    #[default]
    Reject,

    /// Discard the later row silently.
    Ignore,

    /// Replace the earlier row, keeping its position.
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected reject, ignore or replace)"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
        })
    }
}

/// Configuration for JSON import.
///
/// # Example
///
/// ```
/// use table_json::{DuplicatePolicy, ImportOptions};
///
/// let options = ImportOptions::new()
///     .with_duplicate_policy(DuplicatePolicy::Replace)
///     .with_ignore_extra_fields(true)
///     .with_key_field("Id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Handling of rows whose key is already taken.
    pub duplicate_policy: DuplicatePolicy,
    /// Do not report schema fields absent from a row.
    pub ignore_missing_fields: bool,
    /// Do not report row keys that match no schema field.
    pub ignore_extra_fields: bool,
    /// JSON field holding the row key; the schema's key field when unset.
    pub key_field: Option<String>,
    /// Retry a failed field read after parsing a string value as JSON.
    pub reparse_string_values: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            ignore_missing_fields: false,
            ignore_extra_fields: false,
            key_field: None,
            reparse_string_values: true,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_ignore_missing_fields(mut self, ignore: bool) -> Self {
        self.ignore_missing_fields = ignore;
        self
    }

    pub fn with_ignore_extra_fields(mut self, ignore: bool) -> Self {
        self.ignore_extra_fields = ignore;
        self
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    pub fn with_reparse_string_values(mut self, reparse: bool) -> Self {
        self.reparse_string_values = reparse;
        self
    }
}

/// Configuration for JSON export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Row field emitted as `path`; the schema's path field when unset.
    pub path_field: Option<String>,
    /// Emit arrays and sets as string-encoded JSON arrays instead of text form.
    pub export_containers: bool,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_field(mut self, path_field: impl Into<String>) -> Self {
        self.path_field = Some(path_field.into());
        self
    }

    pub fn with_export_containers(mut self, export: bool) -> Self {
        self.export_containers = export;
        self
    }

    /// Path field in effect: the configured one, else the schema's.
    pub fn path_field_name<'a>(&'a self, schemas: &'a SchemaSet) -> &'a str {
        match self.path_field.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => schemas.path_field_name(),
        }
    }
}
