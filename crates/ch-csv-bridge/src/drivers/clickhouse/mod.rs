//! ClickHouse driver over the HTTP interface.
//!
//! - [`ClickhouseConnector`]: opens and verifies connections
//! - [`ClickhouseConnection`]: catalog queries, streaming reads, batched inserts
//! - [`ClickhouseDialect`]: statement builders
//!
//! Rows travel as `JSONCompactEachRow` in both directions (see [`wire`]).

mod client;
mod dialect;
pub mod wire;

pub use client::HttpClient;
pub use dialect::ClickhouseDialect;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConnectionSpec;
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::{ReadOptions, StoreConnection, StoreConnector};
use crate::core::value::{Row, RowBatch};
use crate::error::{BridgeError, Result};

/// Factory for ClickHouse connections.
#[derive(Debug, Clone)]
pub struct ClickhouseConnector {
    connect_timeout: Duration,
}

impl ClickhouseConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl StoreConnector for ClickhouseConnector {
    async fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn StoreConnection>> {
        let client = HttpClient::new(spec, self.connect_timeout)?;
        let conn = ClickhouseConnection {
            client: Arc::new(client),
            dialect: ClickhouseDialect::new(),
        };
        // Surface bad hosts and rejected credentials at connect time.
        conn.ping().await?;
        info!(
            "Connected to ClickHouse at {}:{} (database {})",
            spec.host, spec.port, spec.database
        );
        Ok(Box::new(conn))
    }

    fn db_type(&self) -> &str {
        "clickhouse"
    }
}

/// One ClickHouse endpoint session.
pub struct ClickhouseConnection {
    client: Arc<HttpClient>,
    dialect: ClickhouseDialect,
}

impl ClickhouseConnection {
    async fn stream_impl(
        client: Arc<HttpClient>,
        sql: String,
        opts: ReadOptions,
        tx: mpsc::Sender<Result<RowBatch>>,
    ) -> Result<()> {
        let cancel = client.cancel_token();
        let resp = client.stream(&sql, &opts.table).await?;
        let mut body = resp.bytes_stream();
        let mut assembler = RowAssembler::new(&opts.columns, opts.batch_size);
        let mut total: u64 = 0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(HttpClient::closed_error()),
                c = body.next() => c,
            };
            let chunk = match chunk {
                Some(c) => c.map_err(|e| client.transport_error(e))?,
                None => break,
            };
            for batch in assembler.push(&chunk)? {
                total += batch.len() as u64;
                if tx.send(Ok(batch)).await.is_err() {
                    debug!("{}: reader dropped, stopping stream", opts.table);
                    return Ok(());
                }
            }
        }

        if let Some(batch) = assembler.finish()? {
            total += batch.len() as u64;
            let _ = tx.send(Ok(batch)).await;
        }
        debug!("{}: streamed {} rows", opts.table, total);
        Ok(())
    }
}

/// Turns response body chunks into row batches.
///
/// Chunk boundaries fall anywhere, including inside a row; lines are only
/// decoded once their newline has arrived (or at [`finish`](Self::finish)).
/// Batches hold exactly `batch_size` rows except the last one.
pub(crate) struct RowAssembler<'a> {
    columns: &'a [ColumnDef],
    batch_size: usize,
    pending: BytesMut,
    rows: Vec<Row>,
}

impl<'a> RowAssembler<'a> {
    pub(crate) fn new(columns: &'a [ColumnDef], batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            columns,
            batch_size,
            pending: BytesMut::new(),
            rows: Vec::with_capacity(batch_size),
        }
    }

    /// Feed one chunk and return the batches it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<RowBatch>> {
        self.pending.extend_from_slice(chunk);
        let mut ready = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line = self.pending.split_to(pos + 1);
            if let Some(row) = decode(&line, self.columns)? {
                self.rows.push(row);
            }
            if self.rows.len() >= self.batch_size {
                let rows = std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch_size));
                ready.push(RowBatch::new(rows));
            }
        }
        Ok(ready)
    }

    /// Decode a final line without a trailing newline and return the
    /// remaining rows, if any.
    pub(crate) fn finish(mut self) -> Result<Option<RowBatch>> {
        let rest = std::mem::take(&mut self.pending);
        if let Some(row) = decode(&rest, self.columns)? {
            self.rows.push(row);
        }
        if self.rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RowBatch::new(self.rows)))
        }
    }
}

fn decode(line: &[u8], columns: &[ColumnDef]) -> Result<Option<Row>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| BridgeError::store(None, format!("invalid UTF-8 in response: {}", e)))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Some(err) = client::mid_stream_exception(text) {
        return Err(err);
    }
    wire::decode_line(text, columns).map(Some)
}

#[async_trait]
impl StoreConnection for ClickhouseConnection {
    async fn ping(&self) -> Result<()> {
        self.client.execute(&self.dialect.ping_query()).await
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let lines = self
            .client
            .fetch_lines(&self.dialect.list_tables_query(), None)
            .await?;
        lines
            .iter()
            .map(|line| -> Result<String> {
                let mut cells: Vec<String> = serde_json::from_str(line)?;
                cells
                    .pop()
                    .ok_or_else(|| BridgeError::store(None, "empty row in table listing"))
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let sql = self.dialect.describe_query(table)?;
        let lines = self.client.fetch_lines(&sql, Some(table)).await?;
        let mut columns = Vec::with_capacity(lines.len());
        for line in &lines {
            let cells: Vec<serde_json::Value> = serde_json::from_str(line)?;
            match (
                cells.first().and_then(|v| v.as_str()),
                cells.get(1).and_then(|v| v.as_str()),
            ) {
                (Some(name), Some(type_name)) => columns.push(ColumnDef::new(name, type_name)),
                _ => {
                    return Err(BridgeError::store(
                        None,
                        format!("unexpected DESCRIBE row: {}", line),
                    ))
                }
            }
        }
        debug!("{}: {} columns", table, columns.len());
        Ok(TableSchema::new(table, columns))
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        let client = self.client.clone();
        let sql = self
            .dialect
            .select_query(&opts.table, &opts.columns, opts.limit);

        tokio::spawn(async move {
            let result = match sql {
                Ok(sql) => Self::stream_impl(client, sql, opts, tx.clone()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let sql = self.dialect.create_table_query(schema)?;
        self.client.execute(&sql).await?;
        info!("{}: table created", schema.name);
        Ok(())
    }

    async fn insert_batch(&self, table: &str, columns: &[ColumnDef], rows: Vec<Row>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let statement = self.dialect.insert_query(table, columns)?;
        let count = rows.len() as u64;
        let mut body = String::new();
        for row in &rows {
            if row.len() != columns.len() {
                warn!(
                    "{}: row has {} values for {} columns",
                    table,
                    row.len(),
                    columns.len()
                );
                return Err(BridgeError::transfer(table, "row width does not match column list"));
            }
            body.push_str(&wire::encode_row(row));
            body.push('\n');
        }
        self.client.insert(&statement, body, table).await?;
        debug!("{}: inserted {} rows", table, count);
        Ok(count)
    }

    async fn close(&self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    fn columns() -> Vec<ColumnDef> {
        vec![ColumnDef::new("id", "UInt64"), ColumnDef::new("name", "String")]
    }

    /// Run `chunks` through an assembler and collect every batch.
    fn assemble(chunks: &[&str], batch_size: usize) -> Result<Vec<RowBatch>> {
        let columns = columns();
        let mut assembler = RowAssembler::new(&columns, batch_size);
        let mut batches = Vec::new();
        for chunk in chunks {
            batches.extend(assembler.push(chunk.as_bytes())?);
        }
        batches.extend(assembler.finish()?);
        Ok(batches)
    }

    fn ids(batches: &[RowBatch]) -> Vec<Vec<u64>> {
        batches
            .iter()
            .map(|b| {
                b.rows
                    .iter()
                    .map(|r| match r[0] {
                        Value::UInt(v) => v,
                        ref other => panic!("unexpected id {:?}", other),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_row_split_across_chunks() {
        let batches = assemble(
            &["[\"1\",\"Ann\"]\n[\"2\",\"B", "ob\"]\n[", "\"3\",\"Cy\"]\n"],
            10,
        )
        .unwrap();
        assert_eq!(ids(&batches), vec![vec![1, 2, 3]]);
        assert_eq!(batches[0].rows[1][1], Value::Text("Bob".to_string()));
    }

    #[test]
    fn test_final_line_without_newline() {
        let batches = assemble(&["[\"1\",\"a\"]\n[\"2\",\"b\"]"], 10).unwrap();
        assert_eq!(ids(&batches), vec![vec![1, 2]]);
    }

    #[test]
    fn test_batches_cut_at_batch_size() {
        let body = "[\"1\",\"a\"]\n[\"2\",\"b\"]\n[\"3\",\"c\"]\n[\"4\",\"d\"]\n";
        let batches = assemble(&[body], 2).unwrap();
        assert_eq!(ids(&batches), vec![vec![1, 2], vec![3, 4]]);

        let batches = assemble(&[body, "[\"5\",\"e\"]\n"], 2).unwrap();
        assert_eq!(ids(&batches), vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_empty_body_yields_nothing() {
        assert!(assemble(&[], 2).unwrap().is_empty());
        assert!(assemble(&["\n"], 2).unwrap().is_empty());
    }

    #[test]
    fn test_exception_after_rows_is_reported() {
        let columns = columns();
        let mut assembler = RowAssembler::new(&columns, 2);
        let done = assembler
            .push(b"[\"1\",\"a\"]\n[\"2\",\"b\"]\n")
            .unwrap();
        assert_eq!(ids(&done), vec![vec![1, 2]]);

        let err = assembler
            .push(b"Code: 241. DB::Exception: Memory limit exceeded\n")
            .unwrap_err();
        match err {
            BridgeError::Store { code, message } => {
                assert_eq!(code, Some(241));
                assert!(message.contains("Memory limit"));
            }
            other => panic!("expected store error, got {:?}", other),
        }
    }
}
