//! Local row store: tenant-scoped business tables, companies, documents and
//! a small settings key-value table, all in one SQLite database.

use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::tables::{self, TableConfig};
use crate::types::{Company, Document, Record};

/// Fields assigned by the store itself; never accepted from import mapping
/// or field patches.
const SYSTEM_FIELDS: &[&str] = &["id", "company_id", "document_id", "created_at"];

pub struct Db {
    conn: Mutex<Connection>,
}

/// Column DDL for one configured business column.
fn column_ddl(column: &crate::types::Column) -> String {
    use crate::types::ColumnType;
    let sql_type = match column.column_type {
        Some(ColumnType::Number) => "REAL",
        _ => "TEXT",
    };
    format!("{} {}", column.key, sql_type)
}

fn business_table_ddl(table: &TableConfig) -> String {
    let mut columns = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "company_id INTEGER NOT NULL REFERENCES companies(id)".to_string(),
        "document_id INTEGER REFERENCES documents(id)".to_string(),
        "created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP".to_string(),
    ];
    for column in &table.columns {
        if SYSTEM_FIELDS.contains(&column.key.as_str()) {
            continue;
        }
        columns.push(column_ddl(column));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table.name,
        columns.join(", ")
    )
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        Self::migrate(conn)
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        Self::migrate(Connection::open_in_memory()?)
    }

    fn migrate(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                tax_id TEXT,
                currency TEXT NOT NULL DEFAULT 'CNY',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'uploaded',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )?;

        for table in tables::all() {
            conn.execute_batch(&business_table_ddl(&table))?;
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_company ON {0}(company_id);",
                table.name
            ))?;
        }

        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| Error::Store(e.to_string()))
    }

    // -- settings ----------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // -- companies ---------------------------------------------------------

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, tax_id, currency, created_at FROM companies ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Company {
                id: row.get(0)?,
                name: row.get(1)?,
                tax_id: row.get(2)?,
                currency: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn create_company(&self, name: &str, tax_id: Option<&str>, currency: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO companies (name, tax_id, currency) VALUES (?1, ?2, ?3)",
            params![name.trim(), tax_id, currency],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_company(
        &self,
        id: i64,
        name: &str,
        tax_id: Option<&str>,
        currency: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE companies SET name = ?1, tax_id = ?2, currency = ?3 WHERE id = ?4",
            params![name.trim(), tax_id, currency, id],
        )?;
        Ok(())
    }

    pub fn delete_company(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM companies WHERE id = ?1", params![id])?;
        Ok(())
    }

    // -- documents ---------------------------------------------------------

    pub fn insert_document(&self, company_id: i64, name: &str, status: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (company_id, name, status) VALUES (?1, ?2, ?3)",
            params![company_id, name, status],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_documents(&self, company_id: i64) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, company_id, name, status, created_at FROM documents
             WHERE company_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Document {
                id: row.get(0)?,
                company_id: row.get(1)?,
                name: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn update_document_status(&self, id: i64, status: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(())
    }

    // -- business rows -----------------------------------------------------

    /// All rows of a business table for one company, newest first.
    pub fn list_rows(&self, table: &TableConfig, company_id: i64) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT * FROM {} WHERE company_id = ?1 ORDER BY created_at DESC, id DESC",
            table.name
        );
        let mut stmt = conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(params![company_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (idx, name) in column_names.iter().enumerate() {
                record.insert(name.clone(), column_to_json(row.get_ref(idx)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Insert one row for a company. `fields` is a storage-keyed record;
    /// keys are checked against the table configuration before any SQL is
    /// built. Returns the assigned row id.
    pub fn insert_row(&self, table: &TableConfig, company_id: i64, fields: &Record) -> Result<i64> {
        let conn = self.lock()?;
        insert_one(&conn, table, company_id, fields, None)
    }

    /// Insert a row that back-references the document it was extracted from.
    pub fn insert_extracted_row(
        &self,
        table: &TableConfig,
        company_id: i64,
        document_id: i64,
        fields: &Record,
    ) -> Result<i64> {
        let conn = self.lock()?;
        insert_one(&conn, table, company_id, fields, Some(document_id))
    }

    /// Batched import write: all rows in one transaction. Either every row
    /// is inserted or none are.
    pub fn insert_rows(
        &self,
        table: &TableConfig,
        company_id: i64,
        rows: &[Record],
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for fields in rows {
            insert_one(&tx, table, company_id, fields, None)?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Patch listed fields of one row. System fields cannot be patched and
    /// unknown keys are rejected; the write is scoped to the company.
    pub fn update_row(
        &self,
        table: &TableConfig,
        company_id: i64,
        id: i64,
        fields: &Record,
    ) -> Result<()> {
        let mut assignments = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();
        for (key, value) in fields {
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if !table.has_key(key) {
                return Err(Error::Store(format!(
                    "Unknown column {} for table {}",
                    key, table.name
                )));
            }
            values.push(json_to_column(value));
            assignments.push(format!("{} = ?{}", key, values.len()));
        }
        if assignments.is_empty() {
            return Ok(());
        }
        values.push(rusqlite::types::Value::Integer(id));
        values.push(rusqlite::types::Value::Integer(company_id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{} AND company_id = ?{}",
            table.name,
            assignments.join(", "),
            values.len() - 1,
            values.len()
        );
        let conn = self.lock()?;
        conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(())
    }

    /// Delete one row. When the row carries a `document_id` back-reference,
    /// the originating document is deleted in the same transaction.
    pub fn delete_row(&self, table: &TableConfig, company_id: i64, id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let document_id: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT document_id FROM {} WHERE id = ?1 AND company_id = ?2",
                    table.name
                ),
                params![id, company_id],
                |row| row.get(0),
            )
            .unwrap_or(None);
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1 AND company_id = ?2", table.name),
            params![id, company_id],
        )?;
        if let Some(document_id) = document_id {
            tx.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_one(
    conn: &Connection,
    table: &TableConfig,
    company_id: i64,
    fields: &Record,
    document_id: Option<i64>,
) -> Result<i64> {
    let mut names = vec!["company_id".to_string()];
    let mut values: Vec<rusqlite::types::Value> = vec![rusqlite::types::Value::Integer(company_id)];
    if let Some(document_id) = document_id {
        names.push("document_id".to_string());
        values.push(rusqlite::types::Value::Integer(document_id));
    }
    for (key, value) in fields {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if !table.has_key(key) {
            return Err(Error::Store(format!(
                "Unknown column {} for table {}",
                key, table.name
            )));
        }
        names.push(key.clone());
        values.push(json_to_column(value));
    }
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        names.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}

fn json_to_column(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn column_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(_) => Value::Null,
    }
}
