//! Tabular import/export between the grid's row model and exchange files
//! (xlsx workbooks or CSV). Headers in exchange files are column labels;
//! storage records are keyed by column keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, DataType, Reader};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{Column, ColumnType, Record, ValidationReport};

/// A freshly parsed exchange-file record, keyed by header label. Lives only
/// between parse and confirmed import.
pub type ImportedRow = HashMap<String, String>;

/// Display width hint for a column: label length + 2, at least 15.
fn column_width(label: &str) -> f64 {
    (label.chars().count() as f64 + 2.0).max(15.0)
}

/// Project one stored row into exchange form: every configured column in
/// order, missing or null values as the empty string.
fn project_cell(row: &Record, column: &Column) -> String {
    match row.get(&column.key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write rows to `<table_name>.xlsx` in `dir`, one sheet named "Data".
/// Returns the saved path.
pub fn export_xlsx(
    rows: &[Record],
    columns: &[Column],
    dir: &Path,
    table_name: &str,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.xlsx", table_name));
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Data")?;

    let header_format = Format::new().set_bold();
    for (col, column) in columns.iter().enumerate() {
        worksheet.set_column_width(col as u16, column_width(&column.label))?;
        worksheet.write_string_with_format(0, col as u16, &column.label, &header_format)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let out_row = (row_idx + 1) as u32;
        for (col_idx, column) in columns.iter().enumerate() {
            match row.get(&column.key) {
                Some(Value::Number(n)) => {
                    let v = n.as_f64().unwrap_or(0.0);
                    worksheet.write_number(out_row, col_idx as u16, v)?;
                }
                _ => {
                    let text = project_cell(row, column);
                    worksheet.write_string(out_row, col_idx as u16, &text)?;
                }
            }
        }
    }

    workbook.save(&path)?;
    Ok(path)
}

/// Write rows to `<table_name>.csv` in `dir`: UTF-8, comma-separated, same
/// header and body projection as the xlsx export.
pub fn export_csv(
    rows: &[Record],
    columns: &[Column],
    dir: &Path,
    table_name: &str,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", table_name));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(columns.iter().map(|c| c.label.as_str()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| project_cell(row, c)))?;
    }
    writer.flush()?;
    Ok(path)
}

/// Sample cell for the template's example record, by declared type.
fn sample_value(column: &Column) -> &'static str {
    match column.column_type {
        Some(ColumnType::Number) => "123",
        Some(ColumnType::Date) => "2024-01-01",
        _ => "Sample text",
    }
}

/// Write `<table_name>_template.xlsx` in `dir`: sheet "Template" with the
/// header row, one all-empty record (keeps labels present even when a row is
/// otherwise blank), and one type-directed sample record.
pub fn write_template(columns: &[Column], dir: &Path, table_name: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}_template.xlsx", table_name));
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Template")?;

    let header_format = Format::new().set_bold();
    for (col, column) in columns.iter().enumerate() {
        worksheet.set_column_width(col as u16, column_width(&column.label))?;
        worksheet.write_string_with_format(0, col as u16, &column.label, &header_format)?;
        worksheet.write_string(1, col as u16, "")?;
        worksheet.write_string(2, col as u16, sample_value(column))?;
    }

    workbook.save(&path)?;
    Ok(path)
}

/// Parse an exchange file into label-keyed records. Dispatches on extension:
/// `.csv` goes through the csv crate, everything else is opened as a
/// workbook. Only the first sheet of a workbook is read; later sheets are
/// deliberately ignored.
pub fn parse_exchange_file(path: &Path) -> Result<Vec<ImportedRow>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        parse_csv(path)
    } else {
        parse_workbook(path)
    }
}

fn parse_csv(path: &Path) -> Result<Vec<ImportedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Decode(e.to_string()))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Decode(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Decode(e.to_string()))?;
        let mut row = ImportedRow::new();
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            if let Some(value) = record.get(idx) {
                if !value.is_empty() {
                    row.insert(header.clone(), value.to_string());
                }
            }
        }
        if !row.is_empty() {
            out.push(row);
        }
    }
    Ok(out)
}

fn parse_workbook(path: &Path) -> Result<Vec<ImportedRow>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| Error::Decode(format!("Could not open file: {}", e)))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Decode("Workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::Decode(format!("Could not read sheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| c.as_string().unwrap_or_default())
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for data_row in rows {
        let mut row = ImportedRow::new();
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = data_row
                .get(idx)
                .and_then(|c| c.as_string())
                .unwrap_or_default();
            if !value.is_empty() {
                row.insert(header.clone(), value);
            }
        }
        if !row.is_empty() {
            out.push(row);
        }
    }
    Ok(out)
}

/// Parse a finite numeric literal, locale-independent.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y年%m月%d日"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a calendar date from any accepted representation, truncating any
/// time component.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    None
}

/// Type-check one imported record against the column list. Empty or absent
/// values always pass; only declared `number` and `date` columns are checked.
/// Pure function, no I/O.
pub fn validate_row(row: &ImportedRow, columns: &[Column]) -> ValidationReport {
    let mut errors = Vec::new();
    for column in columns {
        let value = match row.get(&column.label) {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };
        match column.column_type {
            Some(ColumnType::Number) => {
                if parse_number(value).is_none() {
                    errors.push(format!(
                        "{}: \"{}\" is not a valid number",
                        column.label, value
                    ));
                }
            }
            Some(ColumnType::Date) => {
                if parse_date(value).is_none() {
                    errors.push(format!("{}: \"{}\" is not a valid date", column.label, value));
                }
            }
            _ => {}
        }
    }
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Map label-keyed records to storage-keyed records, coercing by declared
/// type. Columns with no non-empty input value are omitted entirely, so
/// partial rows are possible. Does not re-validate and attaches no system
/// fields; the caller scopes the result to a tenant before persisting.
pub fn map_imported_rows(rows: &[ImportedRow], columns: &[Column]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            let mut mapped = Record::new();
            for column in columns {
                let value = match row.get(&column.label) {
                    Some(v) if !v.is_empty() => v,
                    _ => continue,
                };
                let coerced = match column.column_type {
                    Some(ColumnType::Number) => parse_number(value)
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    Some(ColumnType::Date) => match parse_date(value) {
                        Some(d) => Value::String(d.format("%Y-%m-%d").to_string()),
                        None => Value::String(value.clone()),
                    },
                    _ => Value::String(value.clone()),
                };
                mapped.insert(column.key.clone(), coerced);
            }
            mapped
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amount_column() -> Column {
        Column::typed("total_amount_tax_included", "Total Amount", ColumnType::Number)
    }

    fn row(label: &str, value: &str) -> ImportedRow {
        let mut r = ImportedRow::new();
        r.insert(label.to_string(), value.to_string());
        r
    }

    #[test]
    fn rejects_non_numeric_value_with_label_and_raw_value() {
        let report = validate_row(&row("Total Amount", "abc"), &[amount_column()]);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Total Amount"));
        assert!(report.errors[0].contains("abc"));
        assert!(report.errors[0].contains("is not a valid number"));
    }

    #[test]
    fn accepts_and_maps_decimal_amount() {
        let columns = [amount_column()];
        let record = row("Total Amount", "1500.50");
        assert!(validate_row(&record, &columns).valid);

        let mapped = map_imported_rows(&[record], &columns);
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0]["total_amount_tax_included"], json!(1500.5));
    }

    #[test]
    fn maps_date_to_date_only_string() {
        let columns = [Column::typed("transaction_date", "Date", ColumnType::Date)];
        let mapped = map_imported_rows(&[row("Date", "2024-03-15")], &columns);
        assert_eq!(mapped[0]["transaction_date"], json!("2024-03-15"));
    }

    #[test]
    fn truncates_datetime_input_to_date() {
        let columns = [Column::typed("transaction_date", "Date", ColumnType::Date)];
        let mapped = map_imported_rows(&[row("Date", "2024-03-15T10:30:00")], &columns);
        assert_eq!(mapped[0]["transaction_date"], json!("2024-03-15"));
    }

    #[test]
    fn rejects_garbage_date() {
        let columns = [Column::typed("transaction_date", "Date", ColumnType::Date)];
        let report = validate_row(&row("Date", "not-a-date"), &columns);
        assert!(!report.valid);
        assert!(report.errors[0].contains("is not a valid date"));
    }

    #[test]
    fn empty_and_absent_values_always_pass() {
        let columns = [
            amount_column(),
            Column::typed("transaction_date", "Date", ColumnType::Date),
        ];
        assert!(validate_row(&ImportedRow::new(), &columns).valid);
        assert!(validate_row(&row("Total Amount", ""), &columns).valid);
    }

    #[test]
    fn unmatched_and_empty_columns_are_omitted_from_mapping() {
        let columns = [
            Column::new("summary", "Summary"),
            amount_column(),
        ];
        let mapped = map_imported_rows(&[row("Summary", "rent")], &columns);
        assert_eq!(mapped[0].len(), 1);
        assert!(mapped[0].contains_key("summary"));
        assert!(!mapped[0].contains_key("total_amount_tax_included"));
    }

    #[test]
    fn text_columns_accept_anything() {
        let columns = [Column::new("summary", "Summary")];
        assert!(validate_row(&row("Summary", "anything at all 123 !@#"), &columns).valid);
    }

    #[test]
    fn csv_export_projects_labels_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let columns = [Column::new("summary", "Summary")];
        let mut record = Record::new();
        record.insert("summary".to_string(), json!("rent"));

        let path = export_csv(&[record], &columns, dir.path(), "bank_statements").unwrap();
        assert!(path.ends_with("bank_statements.csv"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.trim(), "Summary\nrent");
    }

    #[test]
    fn missing_and_null_values_export_as_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let columns = [
            Column::new("summary", "Summary"),
            Column::new("account_number", "Account"),
        ];
        let mut record = Record::new();
        record.insert("summary".to_string(), Value::Null);

        let path = export_csv(&[record], &columns, dir.path(), "t").unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("Summary,Account"));
        assert_eq!(lines.next(), Some(","));
    }

    #[test]
    fn template_has_two_data_records_with_typed_samples() {
        let dir = tempfile::tempdir().unwrap();
        let columns = [
            Column::new("name", "Name"),
            amount_column(),
            Column::typed("transaction_date", "Date", ColumnType::Date),
        ];
        let path = write_template(&columns, dir.path(), "invoices").unwrap();
        assert!(path.ends_with("invoices_template.xlsx"));

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names().to_vec(), ["Template"]);
        let range = workbook.worksheet_range("Template").unwrap();
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.as_string().unwrap_or_default()).collect())
            .collect();
        assert_eq!(rows[0], ["Name", "Total Amount", "Date"]);
        // header row plus exactly two data records
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], ["Sample text", "123", "2024-01-01"]);
    }

    #[test]
    fn xlsx_export_parses_back_with_first_sheet_named_data() {
        let dir = tempfile::tempdir().unwrap();
        let columns = [
            Column::new("summary", "Summary"),
            amount_column(),
        ];
        let mut record = Record::new();
        record.insert("summary".to_string(), json!("rent"));
        record.insert("total_amount_tax_included".to_string(), json!(1500.5));

        let path = export_xlsx(&[record], &columns, dir.path(), "invoices").unwrap();
        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names().to_vec(), ["Data"]);

        let parsed = parse_exchange_file(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["Summary"], "rent");
        assert_eq!(parse_number(&parsed[0]["Total Amount"]), Some(1500.5));
    }

    #[test]
    fn header_matching_is_exact() {
        // No trimming or case folding: "total amount" does not match "Total Amount".
        let columns = [amount_column()];
        let mapped = map_imported_rows(&[row("total amount", "5")], &columns);
        assert!(mapped[0].is_empty());
    }

    #[test]
    fn unreadable_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        match parse_exchange_file(&path) {
            Err(Error::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other.map(|r| r.len())),
        }
    }
}
