//! Run whole uploads through the importer

use std::io::Cursor;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sheetgate::{
    ExternalUniquenessChecker, FieldDef, FieldType, ImportOptions, ImportRequest, Importer,
    JsonLinesPersistence, KeyValueContext, MemoryStore, PersistenceHandler, RetryPolicy, Schema,
    SchemaRegistry, Workbook, XlsxReader, XlsxWriter,
};
use tempfile::TempDir;

fn products() -> Schema {
    Schema::builder("products")
        .field(FieldDef::new("code", FieldType::String, "Code").not_null().unique())
        .field(FieldDef::new("qty", FieldType::Integer, "Quantity").range(Some(0.0), None))
        .field(FieldDef::new("price", FieldType::Decimal, "Price"))
        .build()
        .unwrap()
}

/// Header row plus one sheet row per entry; a second sheet carries notes
fn upload(rows: &[(&str, f64, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    workbook.add_worksheet_with_name("Notes").unwrap();

    let sheet = workbook.worksheet_mut(0).unwrap();
    for (col, header) in ["Code", "Quantity", "Price"].iter().enumerate() {
        sheet.set_cell_value_at(0, col as u16, *header).unwrap();
    }
    for (i, (code, qty, price)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        if !code.is_empty() {
            sheet.set_cell_value_at(row, 0, *code).unwrap();
        }
        sheet.set_cell_value_at(row, 1, *qty).unwrap();
        sheet.set_cell_value_at(row, 2, *price).unwrap();
    }
    workbook
        .worksheet_mut(1)
        .unwrap()
        .set_cell_value_at(0, 0, "prices exclude tax")
        .unwrap();

    XlsxWriter::write(&workbook, Cursor::new(Vec::new()))
        .unwrap()
        .into_inner()
}

fn options(dir: &TempDir) -> ImportOptions {
    ImportOptions {
        report_dir: dir.path().join("reports"),
        ..ImportOptions::default()
    }
}

fn importer_with<P: PersistenceHandler + 'static>(
    persistence: P,
    options: ImportOptions,
) -> Importer {
    let registry = SchemaRegistry::builder()
        .register(products(), persistence)
        .build()
        .unwrap();
    Importer::new(registry, options).unwrap()
}

#[test]
fn test_valid_upload_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let rows_path = dir.path().join("rows.jsonl");
    let importer = importer_with(JsonLinesPersistence::new(&rows_path), options(&dir));
    let ctx = KeyValueContext::new().with("tenant", "acme");

    let bytes = upload(&[("A-1", 3.0, 9.5), ("A-2", 0.0, 12.25)]);
    let result = importer.run(&ImportRequest::bytes(&bytes, "products", &ctx));

    assert!(result.success, "{}", result.message);
    assert_eq!(result.rows_processed, 2);
    assert_eq!(result.rows_created, 2);
    assert_eq!(result.error_rows, 0);
    assert_eq!(result.report_id, None);

    let text = std::fs::read_to_string(&rows_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(r#"{"row":2,"key":["acme"],"record":{"code":"A-1""#));
}

#[test]
fn test_invalid_rows_produce_report() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new("code", RetryPolicy::immediate(1));
    let importer = importer_with(store, options(&dir));
    let ctx = KeyValueContext::new().with("tenant", "acme");

    let bytes = upload(&[("A-1", 3.0, 9.5), ("", 4.0, 1.0), ("A-3", -2.0, 1.0)]);
    let request = ImportRequest::bytes(&bytes, "products", &ctx).original_name("stock.xlsx");
    let result = importer.run(&request);

    assert!(!result.success);
    assert_eq!(result.rows_processed, 3);
    assert_eq!(result.error_rows, 2);
    assert_eq!(result.rows_created, 0);

    let id = result.report_id.expect("report id");
    let path = importer.reports().locate(&ctx, &id).unwrap();
    assert_eq!(
        importer.reports().original_name(&ctx, &id).unwrap().as_deref(),
        Some("stock.xlsx")
    );

    let report = XlsxReader::read_file(&path).unwrap();
    assert_eq!(report.sheet_names(), vec!["Sheet1", "Notes"]);

    let sheet = report.worksheet(0).unwrap();
    assert_eq!(sheet.value_at(0, 3).to_string(), "Errors");
    assert_eq!(sheet.value_at(1, 3).to_string(), "");
    assert_eq!(sheet.value_at(2, 3).to_string(), "[A] is required");
    assert_eq!(sheet.value_at(3, 3).to_string(), "[B] must be at least 0");
    assert_eq!(sheet.value_at(3, 0).to_string(), "A-3");

    let notes = report.worksheet(1).unwrap();
    assert_eq!(notes.value_at(0, 0).to_string(), "prices exclude tax");

    // a different caller cannot see the report
    let other = KeyValueContext::new().with("tenant", "globex");
    assert!(importer.reports().locate(&other, &id).is_err());
}

#[test]
fn test_too_many_rows_after_parse() {
    let dir = tempfile::tempdir().unwrap();
    let importer = importer_with(
        MemoryStore::new("code", RetryPolicy::immediate(1)),
        ImportOptions {
            max_rows: 3,
            ..options(&dir)
        },
    );
    let ctx = KeyValueContext::new();

    let rows: Vec<(String, f64, f64)> = (0..8).map(|i| (format!("C{}", i), 1.0, 1.0)).collect();
    let rows: Vec<(&str, f64, f64)> = rows.iter().map(|(c, q, p)| (c.as_str(), *q, *p)).collect();
    let bytes = upload(&rows);
    let result = importer.run(&ImportRequest::bytes(&bytes, "products", &ctx));

    assert!(!result.success);
    assert_eq!(result.report_id, None);
    assert_eq!(result.message, "File has 4 data rows; at most 3 are allowed");
}

#[test]
fn test_too_many_rows_from_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let importer = importer_with(
        MemoryStore::new("code", RetryPolicy::immediate(1)),
        ImportOptions {
            max_rows: 3,
            row_count_buffer: 0,
            ..options(&dir)
        },
    );
    let ctx = KeyValueContext::new();

    let rows: Vec<(String, f64, f64)> = (0..10).map(|i| (format!("C{}", i), 1.0, 1.0)).collect();
    let rows: Vec<(&str, f64, f64)> = rows.iter().map(|(c, q, p)| (c.as_str(), *q, *p)).collect();
    let bytes = upload(&rows);
    let result = importer.run(&ImportRequest::bytes(&bytes, "products", &ctx));

    assert!(!result.success);
    assert_eq!(
        result.message,
        "File has 4 (estimated) data rows; at most 3 are allowed"
    );
}

#[test]
fn test_fatal_failures_have_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let importer = importer_with(
        MemoryStore::new("code", RetryPolicy::immediate(1)),
        options(&dir),
    );
    let ctx = KeyValueContext::new();

    let result = importer.run(&ImportRequest::bytes(b"code,qty\nA,1\n", "products", &ctx));
    assert!(!result.success);
    assert!(result.message.starts_with("File rejected"), "{}", result.message);

    let bytes = upload(&[("A-1", 1.0, 1.0)]);
    let result = importer.run(&ImportRequest::bytes(&bytes, "orders", &ctx));
    assert_eq!(result.message, "Unknown schema: orders");
    assert_eq!(result.report_id, None);
    assert!(!dir.path().join("reports").exists());
}

#[test]
fn test_missing_columns_fail_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let importer = importer_with(
        MemoryStore::new("code", RetryPolicy::immediate(1)),
        options(&dir),
    );
    let ctx = KeyValueContext::new();

    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    sheet.set_cell_value_at(0, 0, "Code").unwrap();
    sheet.set_cell_value_at(0, 1, "Amount").unwrap();
    sheet.set_cell_value_at(1, 0, "A-1").unwrap();
    let bytes = XlsxWriter::write(&workbook, Cursor::new(Vec::new()))
        .unwrap()
        .into_inner();

    let result = importer.run(&ImportRequest::bytes(&bytes, "products", &ctx));
    assert!(!result.success);
    assert!(result.message.starts_with("Column resolution failed"));
    assert!(result.message.contains("'Quantity'"));
    assert!(result.message.contains("'Price'"));
}

#[test]
fn test_external_check_blocks_existing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("code", RetryPolicy::immediate(2)));
    let registry = SchemaRegistry::builder()
        .register_shared(
            products(),
            store.clone(),
            Some(store.clone() as Arc<dyn ExternalUniquenessChecker>),
        )
        .build()
        .unwrap();
    let importer = Importer::new(registry, options(&dir)).unwrap();
    let ctx = KeyValueContext::new().with("tenant", "acme");

    let first = upload(&[("A-1", 1.0, 1.0)]);
    assert!(importer.run(&ImportRequest::bytes(&first, "products", &ctx)).success);
    assert_eq!(store.len(), 1);

    let second = upload(&[("A-2", 1.0, 1.0), ("A-1", 5.0, 1.0)]);
    let result = importer.run(&ImportRequest::bytes(&second, "products", &ctx));
    assert!(!result.success);
    assert_eq!(result.error_rows, 1);
    assert_eq!(store.len(), 1);

    let id = result.report_id.unwrap();
    let report = XlsxReader::read_file(importer.reports().locate(&ctx, &id).unwrap()).unwrap();
    assert_eq!(
        report.worksheet(0).unwrap().value_at(2, 3).to_string(),
        "[A] 'A-1' already exists"
    );
}

#[test]
fn test_upload_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("code", RetryPolicy::immediate(1)));
    let registry = SchemaRegistry::builder()
        .register_shared(products(), store.clone(), None)
        .build()
        .unwrap();
    let importer = Importer::new(registry, options(&dir)).unwrap();
    let ctx = KeyValueContext::new();

    let path = dir.path().join("upload.xlsx");
    std::fs::write(&path, upload(&[("A-1", 1.0, 1.0), ("A-2", 2.0, 2.0)])).unwrap();

    assert_eq!(importer.count_rows(&path, 0).unwrap(), 3);
    let result = importer.run(&ImportRequest::file(&path, "products", &ctx));
    assert!(result.success, "{}", result.message);
    assert_eq!(store.len(), 2);
}
