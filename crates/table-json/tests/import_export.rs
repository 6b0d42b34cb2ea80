//! Import/export behavior across the whole engine.

use table_core::{CoercionRegistry, Record, Row, RowStore, SchemaSet, Value};
use table_json::{
    export_rows, flatten_grid_rows, grid_rows, import_rows, DuplicatePolicy, ExportOptions,
    ImportOptions, ImportReport,
};

const SCALAR_SCHEMA: &str = r#"
row: Item
enums:
  - name: Color
    values: [RED, GREEN, { name: BLUE, value: 5 }]
records:
  - name: Item
    fields:
      - { name: Price, type: int32 }
      - { name: Stock, type: uint8 }
      - { name: Weight, type: float }
      - { name: Ratio, type: double }
      - { name: Sold, type: bool }
      - { name: Label, type: string }
      - name: Tint
        type: { type: enum, enum: Color }
      - name: Rank
        type: { type: uint8, enum: Color }
"#;

fn scalar_schemas() -> SchemaSet {
    SchemaSet::from_yaml(SCALAR_SCHEMA).unwrap()
}

fn import(json: &str, schemas: &SchemaSet, store: &mut RowStore, options: &ImportOptions) -> ImportReport {
    import_rows(json, schemas, store, options, &CoercionRegistry::default())
}

fn value<'s>(store: &'s RowStore, row: &str, field: &str) -> &'s Value {
    store.find(row).unwrap().record.get(field).unwrap()
}

#[test]
fn test_round_trip_scalar_schema() {
    let schemas = scalar_schemas();
    let coercions = CoercionRegistry::default();
    let mut original = RowStore::new();
    let report = import(
        r#"[
            {"Name": "Sword", "Price": -30, "Stock": 300, "Weight": 1.1, "Ratio": 0.25,
             "Sold": true, "Label": "Long, sharp", "Tint": "BLUE", "Rank": 1},
            {"Name": "Shield", "Price": 12, "Stock": 4, "Weight": 7, "Ratio": -1.5,
             "Sold": false, "Label": "", "Tint": 0, "Rank": "GREEN"}
        ]"#,
        &schemas,
        &mut original,
        &ImportOptions::default(),
    );
    assert!(report.is_clean(), "{:?}", report.problems());
    assert_eq!(value(&original, "Sword", "Stock"), &Value::Int(44));

    let exported = export_rows(&original, &schemas, 0, 100, &ExportOptions::default(), &coercions).unwrap();
    let flat = flatten_grid_rows(&exported, "Name", "_path").unwrap();

    let mut reimported = RowStore::new();
    let report = import(&flat, &schemas, &mut reimported, &ImportOptions::default());
    assert!(report.is_clean(), "{:?}", report.problems());

    assert_eq!(
        original.keys().collect::<Vec<_>>(),
        reimported.keys().collect::<Vec<_>>()
    );
    for row in original.iter() {
        assert_eq!(Some(row), reimported.find(&row.key));
    }
}

#[test]
fn test_empty_input_leaves_store_unchanged() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    store.insert(Row::new("Existing", Record::empty("Item")));

    for input in ["", "[]"] {
        let report = import(input, &schemas, &mut store, &ImportOptions::default());
        assert!(!report.ok);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["Existing"]);
    }

    let report = import("[", &schemas, &mut store, &ImportOptions::default());
    assert!(!report.ok);
    assert!(report.problems()[0].starts_with("Failed to parse the JSON data. Error: "));
    assert!(store.contains_key("Existing"));
}

#[test]
fn test_successful_import_replaces_store() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    store.insert(Row::new("Existing", Record::empty("Item")));

    let options = ImportOptions::new().with_ignore_missing_fields(true);
    let report = import(r#"[{"Name": "Fresh"}]"#, &schemas, &mut store, &options);
    assert!(report.is_clean());
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["Fresh"]);
}

const DUPLICATES: &str = r#"[
    {"Name": "A", "Price": 1},
    {"Name": "B", "Price": 5},
    {"Name": "A", "Price": 2}
]"#;

#[test]
fn test_duplicate_rows_first_wins() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    let options = ImportOptions::new().with_ignore_missing_fields(true);
    let report = import(DUPLICATES, &schemas, &mut store, &options);

    assert!(report.ok);
    assert_eq!(store.len(), 2);
    assert_eq!(value(&store, "A", "Price"), &Value::Int(1));
    assert_eq!(
        report.problems(),
        &[
            "Duplicate row name 'A'.".to_string(),
            "Failed to read row '2'.".to_string(),
        ]
    );
}

#[test]
fn test_duplicate_rows_ignored_silently() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    let options = ImportOptions::new()
        .with_ignore_missing_fields(true)
        .with_duplicate_policy(DuplicatePolicy::Ignore);
    let report = import(DUPLICATES, &schemas, &mut store, &options);

    assert!(report.is_clean());
    assert_eq!(value(&store, "A", "Price"), &Value::Int(1));
}

#[test]
fn test_duplicate_rows_replaced_in_place() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    let options = ImportOptions::new()
        .with_ignore_missing_fields(true)
        .with_duplicate_policy(DuplicatePolicy::Replace);
    let report = import(DUPLICATES, &schemas, &mut store, &options);

    assert!(report.is_clean());
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(value(&store, "A", "Price"), &Value::Int(2));
}

#[test]
fn test_enum_accepts_name_or_number() {
    let schemas = scalar_schemas();
    let mut store = RowStore::new();
    let options = ImportOptions::new().with_ignore_missing_fields(true);
    let report = import(
        r#"[
            {"Name": "a", "Tint": "RED"},
            {"Name": "b", "Tint": 2},
            {"Name": "c", "Tint": 99},
            {"Name": "d", "Tint": true},
            {"Name": "e", "Tint": {}}
        ]"#,
        &schemas,
        &mut store,
        &options,
    );

    assert!(report.ok);
    assert_eq!(value(&store, "a", "Tint"), &Value::Enum(0));
    assert_eq!(value(&store, "b", "Tint"), &Value::Enum(2));
    assert_eq!(value(&store, "c", "Tint"), &Value::Enum(99));
    assert_eq!(
        report.problems(),
        &[
            "Property 'Tint' on row 'd' is the incorrect type. Expected Integer, got Boolean."
                .to_string(),
            "Failed to read row '3'.".to_string(),
            "Property 'Tint' on row 'e' is the incorrect type. Expected Integer, got Object."
                .to_string(),
            "Failed to read row '4'.".to_string(),
        ]
    );
    assert_eq!(value(&store, "d", "Tint"), &Value::Enum(0));
}

#[test]
fn test_pagination_windows() {
    let schemas = scalar_schemas();
    let rows: Vec<String> = (0..10)
        .map(|i| format!(r#"{{"Name": "row{i}", "Price": {i}}}"#))
        .collect();
    let mut store = RowStore::new();
    let options = ImportOptions::new().with_ignore_missing_fields(true);
    let report = import(&format!("[{}]", rows.join(",")), &schemas, &mut store, &options);
    assert!(report.is_clean());
    assert_eq!(store.len(), 10);

    let coercions = CoercionRegistry::default();
    let export = ExportOptions::default();

    let window = grid_rows(&store, &schemas, 7, 5, &export, &coercions).unwrap();
    let ids: Vec<&str> = window.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["row7", "row8", "row9"]);

    let text = export_rows(&store, &schemas, 10, 5, &export, &coercions).unwrap();
    assert_eq!(text, "[]");

    let window = grid_rows(&store, &schemas, 3, usize::MAX, &export, &coercions).unwrap();
    assert_eq!(window.len(), 7);
}

#[test]
fn test_path_field_exported_beside_cells() {
    let schemas = SchemaSet::from_yaml(
        r#"
row: Entry
path_field: Folder
records:
  - name: Entry
    fields:
      - { name: Text, type: string }
      - { name: Folder, type: string, optional: true }
"#,
    )
    .unwrap();
    let mut store = RowStore::new();
    let report = import(
        r#"[{"Name": "hello", "Text": "Hi", "Folder": "ui/menu"}, {"Name": "bye", "Text": "Bye"}]"#,
        &schemas,
        &mut store,
        &ImportOptions::default(),
    );
    assert!(report.is_clean(), "{:?}", report.problems());

    let rows = grid_rows(
        &store,
        &schemas,
        0,
        2,
        &ExportOptions::default(),
        &CoercionRegistry::default(),
    )
    .unwrap();
    assert_eq!(rows[0].path, "ui/menu");
    assert_eq!(rows[1].path, "");
    assert!(rows
        .iter()
        .all(|row| row.cells.iter().all(|c| c.column_id == "Text")));
}
