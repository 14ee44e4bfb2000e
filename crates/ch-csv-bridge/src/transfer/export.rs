//! Store → file.

use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{TransferEngine, TransferResult, TransferStatus};
use crate::core::schema::ColumnSelection;
use crate::core::traits::{ReadOptions, StoreConnection};
use crate::error::{BridgeError, Result};
use crate::file::CsvSink;

impl TransferEngine {
    /// Stream `selection` of `table` into a CSV file at `destination`.
    ///
    /// The file gets a header line of the selected names, then one record
    /// per row in store order. The store is only read. If a batch fails to
    /// arrive the typed error is returned; records already written stay in
    /// the file.
    pub async fn export_to_file(
        &self,
        conn: &dyn StoreConnection,
        table: &str,
        selection: &ColumnSelection,
        destination: &Path,
    ) -> Result<TransferResult> {
        let start = Instant::now();
        info!(
            "Exporting {} ({} columns) to {}",
            table,
            selection.len(),
            destination.display()
        );

        let sink = CsvSink::create(destination)?;
        let opts = ReadOptions {
            table: table.to_string(),
            columns: selection.columns().to_vec(),
            batch_size: self.config.batch_size,
            read_ahead: self.config.read_ahead,
            limit: None,
        };
        let mut rx = conn.read_rows(opts);

        let columns = selection.columns().to_vec();
        let header = selection.names();
        let coercer = self.coercer.clone();
        let table_name = table.to_string();

        let writer = tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut sink = sink;
            sink.write_header(&header)?;
            let mut batches = 0u64;
            while let Some(batch) = rx.blocking_recv() {
                let batch = match batch {
                    Ok(b) => b,
                    Err(e) => {
                        sink.flush()?;
                        warn!(
                            "{}: read failed after {} rows: {}",
                            table_name,
                            sink.records(),
                            e
                        );
                        return Err(e);
                    }
                };
                for row in &batch.rows {
                    let fields: Vec<String> = row
                        .iter()
                        .zip(&columns)
                        .map(|(value, col)| coercer.to_text(value, &col.native))
                        .collect();
                    sink.write_record(&fields)?;
                }
                batches += 1;
                debug!(
                    "{}: wrote batch {} ({} rows)",
                    table_name,
                    batches,
                    batch.len()
                );
            }
            sink.flush()?;
            Ok(sink.records())
        });

        let rows = writer
            .await
            .map_err(|e| BridgeError::transfer(table, format!("file writer task failed: {}", e)))??;

        let elapsed = start.elapsed();
        info!("{}: exported {} rows in {:?}", table, rows, elapsed);

        Ok(TransferResult {
            status: TransferStatus::Success,
            rows_processed: rows,
            destination: Some(destination.display().to_string()),
            errors: Vec::new(),
            table_created: false,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSpec, TransferConfig};
    use crate::core::schema::{ColumnDef, TableSchema};
    use crate::core::traits::StoreConnector;
    use crate::core::value::Value;
    use crate::drivers::memory::MemoryConnector;
    use crate::projection::project;
    use tempfile::TempDir;

    fn people_store() -> MemoryConnector {
        let store = MemoryConnector::new();
        store.seed_table(
            "default",
            TableSchema::new(
                "people",
                vec![
                    ColumnDef::new("id", "Int32"),
                    ColumnDef::new("name", "String"),
                    ColumnDef::new("email", "Nullable(String)"),
                ],
            ),
            vec![
                vec![Value::Int(1), Value::Text("Ann".into()), Value::Null],
                vec![
                    Value::Int(2),
                    Value::Text("Bob, Jr.".into()),
                    Value::Text(String::new()),
                ],
            ],
        );
        store
    }

    async fn connect(store: &MemoryConnector) -> Box<dyn StoreConnection> {
        store
            .connect(&ConnectionSpec::new("localhost", 8123, "default", "default"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_export_writes_selection_order() {
        let store = people_store();
        let conn = connect(&store).await;
        let schema = conn.describe_table("people").await.unwrap();
        let selection = project(&schema, &["name", "id"]).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        let engine = TransferEngine::new(TransferConfig::default());
        let result = engine
            .export_to_file(conn.as_ref(), "people", &selection, &path)
            .await
            .unwrap();

        assert_eq!(result.status, TransferStatus::Success);
        assert_eq!(result.rows_processed, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,id\nAnn,1\n\"Bob, Jr.\",2\n");
    }

    #[tokio::test]
    async fn test_export_distinguishes_null_from_empty() {
        let store = people_store();
        let conn = connect(&store).await;
        let schema = conn.describe_table("people").await.unwrap();
        let selection = project(&schema, &["email"]).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("emails.csv");
        let engine = TransferEngine::new(TransferConfig::default());
        engine
            .export_to_file(conn.as_ref(), "people", &selection, &path)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "email\n\\N\n\"\"\n");
    }

    #[tokio::test]
    async fn test_export_read_failure_keeps_written_rows() {
        let store = people_store();
        store.fail_reads_after(1);
        let conn = connect(&store).await;
        let schema = conn.describe_table("people").await.unwrap();
        let selection = project(&schema, &["id"]).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.csv");
        let config = TransferConfig {
            batch_size: 1,
            ..TransferConfig::default()
        };
        let engine = TransferEngine::new(config);
        let err = engine
            .export_to_file(conn.as_ref(), "people", &selection, &path)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Store { .. }));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id\n1\n");
    }
}
