//! Store capability traits.
//!
//! - [`StoreConnector`]: the single connection factory; turns a
//!   [`ConnectionSpec`] into a live connection
//! - [`StoreConnection`]: schema discovery, streaming reads and bulk writes
//!   against one store endpoint
//!
//! Drivers live under `drivers/`. The transfer engine, catalog and
//! provisioner only ever see these traits.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::ConnectionSpec;
use crate::error::Result;

use super::schema::{ColumnDef, TableSchema};
use super::value::{Row, RowBatch};

/// Options for streaming rows out of a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in output order.
    pub columns: Vec<ColumnDef>,
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Batches buffered ahead of the consumer.
    pub read_ahead: usize,
    /// Optional row limit (previews).
    pub limit: Option<u64>,
}

impl ReadOptions {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            table: table.into(),
            columns,
            ..Default::default()
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            table: String::new(),
            columns: Vec::new(),
            batch_size: 1_000,
            read_ahead: 2,
            limit: None,
        }
    }
}

/// Connection factory.
///
/// Every request acquires its own connection and must call
/// [`StoreConnection::close`] on every exit path.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a connection to the endpoint described by `spec`.
    ///
    /// Fails with `BridgeError::Connection` when the endpoint cannot be used.
    async fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn StoreConnection>>;

    /// Get the database type identifier (e.g., "clickhouse", "memory").
    fn db_type(&self) -> &str;
}

/// One live store connection.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    /// List table names in the connection's database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describe a table. Fails with `BridgeError::NotFound` if it is absent.
    async fn describe_table(&self, table: &str) -> Result<TableSchema>;

    /// Start streaming rows from a table.
    ///
    /// Returns a channel receiver that yields batches of at most
    /// `opts.batch_size` rows in store order, with cells in `opts.columns`
    /// order. A background task fills the channel; it stops when the
    /// receiver is dropped or after sending the first error.
    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>>;

    /// Create a table if it does not already exist.
    async fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Insert a batch of rows in one round trip. Returns rows written.
    async fn insert_batch(&self, table: &str, columns: &[ColumnDef], rows: Vec<Row>)
        -> Result<u64>;

    /// Release the connection. In-flight and later operations fail with
    /// `BridgeError::Connection`.
    async fn close(&self);
}
