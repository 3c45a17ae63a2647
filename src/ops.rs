//! Operation boundaries tying the adapter, the session and the row store
//! together. Failures are returned as a single error per operation; partial
//! validation failures are not errors, they reduce the import candidate set.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::exchange;
use crate::session::Session;
use crate::tables::TableConfig;
use crate::types::ImportOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

fn output_dir(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(d) => Ok(d.to_path_buf()),
        None => dirs::download_dir()
            .or_else(dirs::desktop_dir)
            .ok_or_else(|| Error::Config("Could not find Downloads or Desktop folder.".to_string())),
    }
}

/// Bulk-import an exchange file into one business table for the session's
/// company. Records failing type validation are dropped and reported in the
/// outcome; surviving records are written as one atomic batch.
pub fn import_exchange_file(
    db: &Db,
    session: &Session,
    table: &TableConfig,
    path: &Path,
) -> Result<ImportOutcome> {
    info!(table = table.name, file = %path.display(), "importing exchange file");
    let imported = exchange::parse_exchange_file(path)?;

    let mut accepted = Vec::new();
    let mut errors = Vec::new();
    for row in &imported {
        let report = exchange::validate_row(row, &table.columns);
        if report.valid {
            accepted.push(row.clone());
        } else {
            errors.extend(report.errors);
        }
    }
    let skipped = imported.len() - accepted.len();
    if skipped > 0 {
        warn!(
            table = table.name,
            skipped, "rows dropped from import for failing validation"
        );
    }

    let mapped = exchange::map_imported_rows(&accepted, &table.columns);
    let inserted = if mapped.is_empty() {
        0
    } else {
        db.insert_rows(table, session.company_id, &mapped)?
    };
    info!(table = table.name, inserted, skipped, "import finished");
    Ok(ImportOutcome {
        inserted,
        skipped,
        errors,
    })
}

/// Export the session's rows of one table. With `dir` unset the file lands
/// in Downloads (Desktop as fallback). Returns the saved path.
pub fn export_table(
    db: &Db,
    session: &Session,
    table: &TableConfig,
    format: ExportFormat,
    dir: Option<&Path>,
) -> Result<PathBuf> {
    let dir = output_dir(dir)?;
    let rows = db.list_rows(table, session.company_id)?;
    let path = match format {
        ExportFormat::Xlsx => exchange::export_xlsx(&rows, &table.columns, &dir, table.name)?,
        ExportFormat::Csv => exchange::export_csv(&rows, &table.columns, &dir, table.name)?,
    };
    info!(table = table.name, rows = rows.len(), file = %path.display(), "exported table");
    Ok(path)
}

/// Write the import template for one table.
pub fn write_table_template(table: &TableConfig, dir: Option<&Path>) -> Result<PathBuf> {
    let dir = output_dir(dir)?;
    exchange::write_template(&table.columns, &dir, table.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;
    use serde_json::json;

    fn session(db: &Db) -> Session {
        let company_id = db.create_company("Acme Trading", None, "CNY").unwrap();
        Session::select(db, company_id).unwrap()
    }

    #[test]
    fn import_drops_invalid_rows_and_inserts_the_rest() {
        let db = Db::open_in_memory().unwrap();
        let session = session(&db);
        let table = tables::invoices();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        std::fs::write(
            &path,
            "Number,Total Amount\nINV-1,1500.50\nINV-2,abc\nINV-3,200\n",
        )
        .unwrap();

        let outcome = import_exchange_file(&db, &session, &table, &path).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("Total Amount"));

        let rows = db.list_rows(&table, session.company_id).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unreadable_file_aborts_with_no_rows_written() {
        let db = Db::open_in_memory().unwrap();
        let session = session(&db);
        let table = tables::invoices();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"garbage").unwrap();

        assert!(matches!(
            import_exchange_file(&db, &session, &table, &path),
            Err(Error::Decode(_))
        ));
        assert!(db.list_rows(&table, session.company_id).unwrap().is_empty());
    }

    #[test]
    fn export_only_contains_the_sessions_rows() {
        let db = Db::open_in_memory().unwrap();
        let session = session(&db);
        let other = db.create_company("Other Co", None, "USD").unwrap();
        let table = tables::payroll_records();

        let mut mine = crate::types::Record::new();
        mine.insert("employee_id".to_string(), json!("E-1"));
        db.insert_row(&table, session.company_id, &mine).unwrap();

        let mut theirs = crate::types::Record::new();
        theirs.insert("employee_id".to_string(), json!("E-2"));
        db.insert_row(&table, other, &theirs).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = export_table(&db, &session, &table, ExportFormat::Csv, Some(dir.path())).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("E-1"));
        assert!(!body.contains("E-2"));
    }
}
