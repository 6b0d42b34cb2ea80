//! Core types for the datatable-sync marshaling engine.
//!
//! This crate provides the schema and value model shared by import and
//! export, including:
//!
//! - [`TypeTag`] - Closed set of field kinds driving every dispatch
//! - [`SchemaSet`] - Record and enum schemas loaded from YAML
//! - [`Value`] / [`Record`] - Typed values owned by a row
//! - [`RowStore`] - Key-addressed rows in insertion order
//! - [`Diagnostics`] - Ordered, append-only problem log
//! - [`CoercionRegistry`] - Per-type string ↔ value coercions
//!
//! # Architecture
//!
//! ```text
//! table-core (this crate)
//!    │
//!    └─── table-json   (JSON import/export over RowStore)
//! ```
//!
//! # Example
//!
//! ```rust
//! use table_core::{CoercionRegistry, SchemaSet, TypeTag, Value};
//!
//! let schemas = SchemaSet::from_yaml(
//!     r#"
//! row: Vector
//! records:
//!   - name: Vector
//!     fields:
//!       - { name: X, type: float }
//!       - { name: Y, type: float }
//! "#,
//! )
//! .unwrap();
//!
//! let registry = CoercionRegistry::default();
//! let value = registry
//!     .parse("X=1,Y=2", &TypeTag::record("Vector"), &schemas)
//!     .unwrap();
//! let record = value.as_record().unwrap();
//! assert_eq!(record.get("Y"), Some(&Value::Float(2.0)));
//! ```

pub mod coercion;
pub mod diagnostics;
pub mod naming;
pub mod schema;
pub mod text;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use coercion::{Coercion, CoercionError, CoercionRegistry, DateTimeCoercion, GuidCoercion};
pub use diagnostics::Diagnostics;
pub use naming::make_valid_name;
pub use schema::{EnumDef, EnumVariant, FieldDescriptor, RecordSchema, SchemaError, SchemaSet};
pub use types::{FloatWidth, IntWidth, TypeTag};
pub use values::{Record, Row, RowStore, Value, ValueMap, ValueSet};
