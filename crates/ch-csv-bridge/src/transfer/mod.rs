//! Transfer engine with a read-ahead pipeline.
//!
//! Each transfer is one sequential pipeline: read a batch, coerce it, write
//! it. A bounded channel sits between the reading and writing stage so that
//! reading batch N+1 overlaps writing batch N. Output order always equals
//! input order.
//!
//! - [`TransferEngine::export_to_file`]: store → CSV file
//! - [`TransferEngine::import_from_file`]: CSV file → store

mod export;
mod import;

use serde::Serialize;

use crate::coerce::TypeCoercer;
use crate::config::TransferConfig;
use crate::error::{BridgeError, Result, RowError};

/// Final state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Every row moved.
    Success,
    /// Completed, but some rows were skipped (see `errors`).
    Partial,
    /// Aborted because a batch exceeded the error tolerance.
    Failure,
}

/// Summary of one transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub status: TransferStatus,

    /// Rows written to the destination. On failure, rows committed by the
    /// batches before the one that aborted.
    pub rows_processed: u64,

    /// File path or table name written to.
    pub destination: Option<String>,

    /// Rows that could not be converted, in file order.
    pub errors: Vec<RowError>,

    /// Whether the destination table was created by this transfer.
    pub table_created: bool,

    pub duration_ms: u64,
}

impl TransferResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// For an aborted import, the row error that pushed the failing batch
    /// over the limit. `None` unless the status is `failure`.
    pub fn abort_cause(&self) -> Option<BridgeError> {
        if self.status != TransferStatus::Failure {
            return None;
        }
        self.errors.last().cloned().map(BridgeError::from)
    }
}

/// Runs single-direction transfers with one set of transfer settings.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    config: TransferConfig,
    coercer: TypeCoercer,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        let coercer = TypeCoercer::new(config.null_marker.clone());
        Self { config, coercer }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn coercer(&self) -> &TypeCoercer {
        &self.coercer
    }
}

/// Whether a batch with `failed` bad rows out of `total` may be committed
/// without them.
fn within_tolerance(failed: usize, total: usize, max_error_fraction: f64) -> bool {
    failed == 0 || (failed as f64) < max_error_fraction * (total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_is_strict() {
        assert!(within_tolerance(0, 10, 0.2));
        assert!(within_tolerance(1, 10, 0.2));
        assert!(!within_tolerance(2, 10, 0.2));
        assert!(!within_tolerance(5, 10, 0.2));
        assert!(!within_tolerance(1, 1, 1.0));
    }

    #[test]
    fn test_result_json_uses_snake_case_status() {
        let result = TransferResult {
            status: TransferStatus::Partial,
            rows_processed: 9,
            destination: Some("people".into()),
            errors: vec![RowError::new(4, "age", "x", "not an integer")],
            table_created: false,
            duration_ms: 3,
        };
        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"partial\""));
        assert!(json.contains("\"row\": 4"));
    }

    #[test]
    fn test_abort_cause_only_for_failure() {
        let mut result = TransferResult {
            status: TransferStatus::Partial,
            rows_processed: 0,
            destination: Some("people".into()),
            errors: vec![
                RowError::new(2, "age", "x", "not an integer"),
                RowError::new(5, "age", "y", "not an integer"),
            ],
            table_created: false,
            duration_ms: 1,
        };
        assert!(result.abort_cause().is_none());

        result.status = TransferStatus::Failure;
        match result.abort_cause() {
            Some(BridgeError::TypeCoercion(e)) => {
                assert_eq!(e.row, 5);
                assert_eq!(e.raw, "y");
            }
            other => panic!("expected type coercion error, got {:?}", other),
        }
        assert_eq!(result.abort_cause().map(|e| e.exit_code()), Some(5));
    }
}
