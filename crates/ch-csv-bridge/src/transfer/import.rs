//! File → store.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{within_tolerance, TransferEngine, TransferResult, TransferStatus};
use crate::core::schema::ColumnDef;
use crate::core::traits::StoreConnection;
use crate::core::value::Row;
use crate::error::{BridgeError, Result, RowError};
use crate::file::{CsvSource, TextBatch};
use crate::projection::project_or_all;
use crate::provision::{ensure_table, schema_from_header};

/// Where each destination column's text comes from in a file record.
struct ColumnMapping {
    target: ColumnDef,
    file_pos: usize,
}

impl TransferEngine {
    /// Load a CSV file into `table`, creating the table from the file header
    /// if it does not exist (and `create_if_missing` is set).
    ///
    /// `columns` picks header columns to load; empty means all of them. Each
    /// must also exist in the destination table.
    ///
    /// Rows that fail conversion are skipped and reported as long as they
    /// stay strictly below `max_error_fraction` of their batch; a batch at or
    /// above the limit stops the transfer with status `failure`, keeping the
    /// batches already inserted.
    ///
    /// This is not idempotent: importing the same file twice appends every
    /// row twice.
    pub async fn import_from_file<S: AsRef<str>>(
        &self,
        conn: &dyn StoreConnection,
        source: &Path,
        table: &str,
        columns: &[S],
    ) -> Result<TransferResult> {
        let start = Instant::now();
        info!("Importing {} into {}", source.display(), table);

        let path: PathBuf = source.to_path_buf();
        let csv = tokio::task::spawn_blocking(move || CsvSource::open(&path))
            .await
            .map_err(|e| BridgeError::transfer(table, format!("file reader task failed: {}", e)))??;
        let header = csv.header().to_vec();

        let file_schema = schema_from_header(table, &header)?;
        let selection = project_or_all(&file_schema, columns)?;
        let provisioned =
            ensure_table(conn, table, &header, self.config.create_if_missing).await?;

        let mappings = selection
            .columns()
            .iter()
            .map(|col| -> Result<ColumnMapping> {
                let target = provisioned.schema.column(&col.name).ok_or_else(|| {
                    BridgeError::invalid_selection(
                        &col.name,
                        format!("no such column in table '{}'", table),
                    )
                })?;
                let file_pos = file_schema.position(&col.name).ok_or_else(|| {
                    BridgeError::invalid_selection(&col.name, "no such column in file header")
                })?;
                Ok(ColumnMapping {
                    target: target.clone(),
                    file_pos,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let target_columns: Vec<ColumnDef> = mappings.iter().map(|m| m.target.clone()).collect();

        let mut rx = spawn_reader(csv, self.config.batch_size);

        let mut committed: u64 = 0;
        let mut errors: Vec<RowError> = Vec::new();
        let mut batches = 0u64;

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            batches += 1;
            let total = batch.records.len();
            let (rows, batch_errors) = self.convert_batch(&batch, &mappings, header.len());

            if !within_tolerance(batch_errors.len(), total, self.config.max_error_fraction) {
                warn!(
                    "{}: batch {} has {} of {} rows failing (limit {}), aborting",
                    table,
                    batches,
                    batch_errors.len(),
                    total,
                    self.config.max_error_fraction
                );
                errors.extend(batch_errors);
                return Ok(TransferResult {
                    status: TransferStatus::Failure,
                    rows_processed: committed,
                    destination: Some(table.to_string()),
                    errors,
                    table_created: provisioned.created,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }

            for e in &batch_errors {
                warn!("{}: skipping {}", table, e);
            }
            errors.extend(batch_errors);

            if !rows.is_empty() {
                committed += conn.insert_batch(table, &target_columns, rows).await?;
            }
            debug!(
                "{}: batch {} committed ({} rows total)",
                table, batches, committed
            );
        }

        let status = if errors.is_empty() {
            TransferStatus::Success
        } else {
            TransferStatus::Partial
        };
        let elapsed = start.elapsed();
        info!(
            "{}: imported {} rows in {:?} ({} skipped)",
            table,
            committed,
            elapsed,
            errors.len()
        );

        Ok(TransferResult {
            status,
            rows_processed: committed,
            destination: Some(table.to_string()),
            errors,
            table_created: provisioned.created,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    /// Convert a batch of records. A row with any bad cell is left out and
    /// reported once, for its first bad cell.
    fn convert_batch(
        &self,
        batch: &TextBatch,
        mappings: &[ColumnMapping],
        header_len: usize,
    ) -> (Vec<Row>, Vec<RowError>) {
        let mut rows = Vec::with_capacity(batch.records.len());
        let mut errors = Vec::new();

        for (i, record) in batch.records.iter().enumerate() {
            let row_no = batch.first_row + i as u64;
            let converted: std::result::Result<Row, RowError> = mappings
                .iter()
                .map(|m| match record.get(m.file_pos) {
                    Some(raw) => self.coercer.to_native(raw, &m.target, row_no),
                    None => Err(RowError::new(
                        row_no,
                        &m.target.name,
                        "",
                        format!(
                            "record has {} fields, header has {}",
                            record.len(),
                            header_len
                        ),
                    )),
                })
                .collect();
            match converted {
                Ok(row) => rows.push(row),
                Err(e) => errors.push(e),
            }
        }

        (rows, errors)
    }
}

/// Read the file on a blocking thread, one batch ahead of the inserter.
/// Stops when the receiver is dropped or after the first error.
fn spawn_reader(mut csv: CsvSource, batch_size: usize) -> mpsc::Receiver<Result<TextBatch>> {
    let (tx, rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || loop {
        match csv.next_batch(batch_size) {
            Ok(Some(batch)) => {
                if tx.blocking_send(Ok(batch)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    });
    rx
}
