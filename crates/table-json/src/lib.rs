//! JSON import and export for table-core row stores.
//!
//! # Modules
//!
//! - [`reverse`] - JSON rows → typed row store, with per-field diagnostics
//! - [`forward`] - typed row store → grid JSON, one window at a time
//! - [`resolver`] - JSON keys → schema fields via import aliases
//! - [`grid`] - grid JSON → flat import rows
//! - [`options`] - import and export policies
//!
//! # Example
//!
//! ```
//! use table_core::{CoercionRegistry, RowStore, SchemaSet};
//! use table_json::{export_rows, import_rows, ExportOptions, ImportOptions};
//!
//! let schemas = SchemaSet::from_yaml(
//!     r#"
//! row: Item
//! records:
//!   - name: Item
//!     fields:
//!       - { name: Price, type: int32 }
//!       - { name: Sold, type: bool }
//! "#,
//! )
//! .unwrap();
//! let coercions = CoercionRegistry::default();
//!
//! let mut store = RowStore::new();
//! let report = import_rows(
//!     r#"[{"Name": "Sword", "Price": 30, "Sold": false}]"#,
//!     &schemas,
//!     &mut store,
//!     &ImportOptions::default(),
//!     &coercions,
//! );
//! assert!(report.is_clean());
//!
//! let json = export_rows(&store, &schemas, 0, 10, &ExportOptions::default(), &coercions).unwrap();
//! assert!(json.contains("\"columnId\": \"Price\""));
//! ```

pub mod forward;
pub mod grid;
pub mod options;
pub mod resolver;
pub mod reverse;

pub use forward::{export_rows, grid_rows, ExportError, GridCell, GridRow};
pub use grid::flatten_grid_rows;
pub use options::{DuplicatePolicy, ExportOptions, ImportOptions};
pub use resolver::{resolve, Resolution};
pub use reverse::{import_rows, ImportReport};
