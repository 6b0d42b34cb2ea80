//! datatable-sync library
//!
//! Moves typed table rows between YAML-described schemas and JSON files.
//!
//! # Crates
//!
//! - `table_core` - type tags, schemas, typed values and the row store
//! - `table_json` - JSON import (with diagnostics) and windowed grid export
//!
//! # CLI Usage
//!
//! ```bash
//! # Import rows and print every diagnostic
//! datatable-sync import --schema items.yaml --input items.json
//!
//! # Re-export rows 100..150 as grid JSON
//! datatable-sync export --schema items.yaml --input items.json \
//!   --start-index 100 --max-count 50 --output page.json
//!
//! # Validate a schema file
//! datatable-sync check-schema --schema items.yaml
//! ```

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use table_core::{CoercionRegistry, RowStore, SchemaSet};
use table_json::{DuplicatePolicy, ExportOptions, ImportOptions, ImportReport};
use tracing::info;

/// Runtime settings loaded from an optional TOML file.
///
/// ```toml
/// [import]
/// duplicate_policy = "replace"
/// ignore_extra_fields = true
///
/// [export]
/// start_index = 0
/// max_count = 500
/// path_field = "Folder"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub import: ImportOptions,
    pub export: ExportSettings,
}

/// Export window plus export options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub start_index: usize,
    /// Rows per export; unlimited when unset
    pub max_count: Option<usize>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path:?}"))?;
        Self::from_toml(&content).with_context(|| format!("Invalid settings file {path:?}"))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Import policy flags overriding the settings file.
#[derive(Parser, Clone, Debug, Default)]
pub struct PolicyOpts {
    /// Handling of rows whose key is already taken (reject, ignore, replace)
    #[arg(long, env = "DATATABLE_DUPLICATES")]
    pub duplicates: Option<DuplicatePolicy>,

    /// JSON field holding each row's key
    #[arg(long, env = "DATATABLE_KEY_FIELD")]
    pub key_field: Option<String>,

    /// Do not report schema fields missing from a row
    #[arg(long)]
    pub ignore_missing_fields: bool,

    /// Do not report row fields missing from the schema
    #[arg(long)]
    pub ignore_extra_fields: bool,

    /// Do not retry failed string values as embedded JSON
    #[arg(long)]
    pub no_reparse: bool,
}

impl PolicyOpts {
    /// Apply the flags that were given on top of `options`.
    pub fn apply(&self, mut options: ImportOptions) -> ImportOptions {
        if let Some(policy) = self.duplicates {
            options.duplicate_policy = policy;
        }
        if let Some(key_field) = &self.key_field {
            options.key_field = Some(key_field.clone());
        }
        options.ignore_missing_fields |= self.ignore_missing_fields;
        options.ignore_extra_fields |= self.ignore_extra_fields;
        if self.no_reparse {
            options.reparse_string_values = false;
        }
        options
    }
}

/// Load and validate a schema file.
pub fn load_schema(path: &Path) -> anyhow::Result<SchemaSet> {
    SchemaSet::from_file(path).with_context(|| format!("Failed to load schema from {path:?}"))
}

/// Import a JSON file into `store`.
///
/// With `grid_path_field`, the file holds previously exported grid rows and
/// is flattened first, each row's `path` landing in that field.
pub fn import_file(
    schemas: &SchemaSet,
    input: &Path,
    options: &ImportOptions,
    grid_path_field: Option<&str>,
    store: &mut RowStore,
) -> anyhow::Result<ImportReport> {
    let mut text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file {input:?}"))?;
    if let Some(path_field) = grid_path_field {
        let key_field = match options.key_field.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => schemas.key_field_name(),
        };
        text = table_json::flatten_grid_rows(&text, key_field, path_field)
            .with_context(|| format!("{input:?} is not grid JSON"))?;
    }

    let report = table_json::import_rows(
        &text,
        schemas,
        store,
        options,
        &CoercionRegistry::default(),
    );
    info!(
        input = %input.display(),
        rows = store.len(),
        problems = report.diagnostics.len(),
        "imported file"
    );
    Ok(report)
}

/// Export one window of `store` as grid JSON.
pub fn export_window(
    store: &RowStore,
    schemas: &SchemaSet,
    settings: &ExportSettings,
) -> anyhow::Result<String> {
    let max_count = settings.max_count.unwrap_or(usize::MAX);
    let text = table_json::export_rows(
        store,
        schemas,
        settings.start_index,
        max_count,
        &settings.options,
        &CoercionRegistry::default(),
    )
    .context("Failed to export rows")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
[import]
duplicate_policy = "replace"
ignore_extra_fields = true

[export]
start_index = 5
max_count = 20
path_field = "Folder"
"#,
        )
        .unwrap();
        assert_eq!(settings.import.duplicate_policy, DuplicatePolicy::Replace);
        assert!(settings.import.ignore_extra_fields);
        assert!(settings.import.reparse_string_values);
        assert_eq!(settings.export.start_index, 5);
        assert_eq!(settings.export.max_count, Some(20));
        assert_eq!(settings.export.options.path_field.as_deref(), Some("Folder"));
        assert!(!settings.export.options.export_containers);
    }

    #[test]
    fn test_empty_settings_are_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
        assert!(Settings::from_toml("[import]\nduplicate_policy = \"merge\"").is_err());
    }

    #[test]
    fn test_policy_flags_override() {
        let opts = PolicyOpts {
            duplicates: Some(DuplicatePolicy::Ignore),
            key_field: Some("Id".to_string()),
            no_reparse: true,
            ..Default::default()
        };
        let base = ImportOptions::new().with_ignore_extra_fields(true);
        let options = opts.apply(base);
        assert_eq!(options.duplicate_policy, DuplicatePolicy::Ignore);
        assert_eq!(options.key_field.as_deref(), Some("Id"));
        assert!(options.ignore_extra_fields);
        assert!(!options.ignore_missing_fields);
        assert!(!options.reparse_string_values);
    }
}
