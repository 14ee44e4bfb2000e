//! Error types for the bridge library.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single cell that could not be converted to its destination type.
///
/// Row numbers count data rows from 1 (the header line is not counted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row number in the source file.
    pub row: u64,

    /// Column the offending cell belongs to.
    pub column: String,

    /// Raw text as read from the file.
    pub raw: String,

    /// Why the conversion failed.
    pub reason: String,
}

impl RowError {
    pub fn new(
        row: u64,
        column: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row,
            column: column.into(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}, column '{}' (value {:?}): {}",
            self.row, self.column, self.raw, self.reason
        )
    }
}

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store unreachable, credentials rejected, or connection closed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Table, database or file does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Requested column selection is invalid (caller input error).
    #[error("Invalid column selection: '{column}': {reason}")]
    InvalidSelection { column: String, reason: String },

    /// A cell could not be coerced to its destination type.
    #[error("Type coercion failed at {0}")]
    TypeCoercion(RowError),

    /// Failure reported by the store.
    #[error("Store error{}: {message}", format_code(.code))]
    Store { code: Option<u32>, message: String },

    /// Transfer aborted for a specific table.
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_code(code: &Option<u32>) -> String {
    match code {
        Some(c) => format!(" (code {})", c),
        None => String::new(),
    }
}

impl From<RowError> for BridgeError {
    fn from(err: RowError) -> Self {
        BridgeError::TypeCoercion(err)
    }
}

impl BridgeError {
    /// Create a NotFound error for a table.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        BridgeError::NotFound {
            kind: "Table",
            name: name.into(),
        }
    }

    /// Create a NotFound error for a file.
    pub fn file_not_found(name: impl Into<String>) -> Self {
        BridgeError::NotFound {
            kind: "File",
            name: name.into(),
        }
    }

    /// Create an InvalidSelection error naming the offending column.
    pub fn invalid_selection(column: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::InvalidSelection {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a Store error.
    pub fn store(code: Option<u32>, message: impl Into<String>) -> Self {
        BridgeError::Store {
            code,
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            BridgeError::Config(_) | BridgeError::Yaml(_) => 1,
            BridgeError::Connection(_) => 2,
            BridgeError::NotFound { .. } => 3,
            BridgeError::InvalidSelection { .. } => 4,
            BridgeError::TypeCoercion(_) | BridgeError::Transfer { .. } => 5,
            BridgeError::Store { .. } => 6,
            BridgeError::Io(_) | BridgeError::Csv(_) => 7,
            BridgeError::Json(_) => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_with_code() {
        let err = BridgeError::store(Some(60), "Table default.t does not exist");
        assert_eq!(
            err.to_string(),
            "Store error (code 60): Table default.t does not exist"
        );

        let err = BridgeError::store(None, "boom");
        assert_eq!(err.to_string(), "Store error: boom");
    }

    #[test]
    fn test_type_coercion_display_cites_row_and_column() {
        let err: BridgeError = RowError::new(7, "age", "abc", "invalid digit").into();
        let msg = err.to_string();
        assert!(msg.contains("row 7"));
        assert!(msg.contains("'age'"));
        assert!(msg.contains("\"abc\""));
    }

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        assert_eq!(BridgeError::Config("x".into()).exit_code(), 1);
        assert_eq!(BridgeError::Connection("x".into()).exit_code(), 2);
        assert_eq!(BridgeError::table_not_found("t").exit_code(), 3);
        assert_eq!(BridgeError::invalid_selection("c", "r").exit_code(), 4);
        assert_eq!(BridgeError::store(None, "x").exit_code(), 6);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(BridgeError::from(io).exit_code(), 7);
    }

    #[test]
    fn test_not_found_display() {
        assert_eq!(
            BridgeError::file_not_found("data.csv").to_string(),
            "File not found: data.csv"
        );
    }
}
