use thiserror::Error;

/// Failure categories surfaced to the caller. Messages stay human-readable
/// strings; there are no structured error codes beyond the variant itself.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream could not be interpreted as a workbook or CSV.
    #[error("Could not read spreadsheet: {0}")]
    Decode(String),

    /// The local row store rejected a read or write.
    #[error("Storage error: {0}")]
    Store(String),

    /// The extraction backend was unreachable or returned an error.
    #[error("Extraction service error: {0}")]
    Service(String),

    /// Missing or invalid configuration (environment, paths).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        let message = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            _ => Error::Decode(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
