//! Backend for a business-document dashboard: companies upload financial
//! documents, an external AI service extracts structured data, and reviewed
//! rows land in editable business tables with spreadsheet import/export.

pub mod db;
pub mod error;
pub mod exchange;
pub mod extraction;
pub mod ops;
pub mod session;
pub mod tables;
pub mod types;

pub use db::Db;
pub use error::{Error, Result};
pub use extraction::ExtractionClient;
pub use ops::ExportFormat;
pub use session::Session;
pub use tables::TableConfig;
pub use types::{Column, ColumnType, ImportOutcome, Record, ValidationReport};
