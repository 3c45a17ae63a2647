use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared cell type of a grid column. Drives import validation and
/// coercion; `Text` columns accept anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Date,
}

/// One grid column: `key` is the storage field name, `label` is the display
/// name and doubles as the exchange-file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(rename = "type", default)]
    pub column_type: Option<ColumnType>,
}

impl Column {
    pub fn new(key: &str, label: &str) -> Self {
        Column {
            key: key.to_string(),
            label: label.to_string(),
            editable: true,
            column_type: None,
        }
    }

    pub fn typed(key: &str, label: &str, column_type: ColumnType) -> Self {
        Column {
            key: key.to_string(),
            label: label.to_string(),
            editable: true,
            column_type: Some(column_type),
        }
    }

    pub fn readonly(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// A stored business row: storage-keyed fields as loose JSON values.
/// `id` and `company_id` are system fields assigned at insert time.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub currency: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub status: String,
    pub created_at: String,
}

/// Outcome of a per-row type check. `valid` is true iff `errors` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Result of a bulk import: how many rows were written, how many were
/// dropped for failing validation, and the per-row error strings.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}
