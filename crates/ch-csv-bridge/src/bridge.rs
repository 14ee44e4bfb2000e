//! Request-level service.
//!
//! [`Bridge`] is what an outer surface (the CLI here) talks to. Every call
//! takes a [`ConnectionSpec`], opens its own connection through the
//! connector, runs one operation and closes the connection on every exit
//! path. Nothing is shared or cached between calls.

use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::coerce::TypeCoercer;
use crate::config::{ConnectionSpec, TransferConfig};
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::{ReadOptions, StoreConnection, StoreConnector};
use crate::core::value::Row;
use crate::drivers::clickhouse::ClickhouseConnector;
use crate::error::Result;
use crate::projection::project_or_all;
use crate::transfer::{TransferEngine, TransferResult};

/// Health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// Whether the store answered `SELECT 1`.
    pub connected: bool,

    /// Round-trip time including connection setup, in milliseconds.
    pub latency_ms: u64,

    /// Error message if the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// First rows of a table for display.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

/// Entry point for every bridge operation.
pub struct Bridge {
    connector: Arc<dyn StoreConnector>,
    engine: TransferEngine,
}

impl Bridge {
    pub fn new(connector: Arc<dyn StoreConnector>, config: TransferConfig) -> Self {
        Self {
            connector,
            engine: TransferEngine::new(config),
        }
    }

    /// Bridge backed by the ClickHouse HTTP driver.
    pub fn clickhouse(config: TransferConfig) -> Self {
        let connector = ClickhouseConnector::new(config.connect_timeout());
        Self::new(Arc::new(connector), config)
    }

    pub fn config(&self) -> &TransferConfig {
        self.engine.config()
    }

    /// Coercer used for file text, also suitable for rendering previews.
    pub fn coercer(&self) -> &TypeCoercer {
        self.engine.coercer()
    }

    /// Run `op` on a fresh connection and close it afterwards, whatever the
    /// outcome.
    async fn scoped<T, F, Fut>(&self, spec: &ConnectionSpec, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn StoreConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let conn: Arc<dyn StoreConnection> = Arc::from(self.connector.connect(spec).await?);
        let result = op(conn.clone()).await;
        conn.close().await;
        debug!("{}: connection closed", self.connector.db_type());
        result
    }

    /// Check that the store is reachable and accepts the credential.
    ///
    /// Never fails: problems are reported in the result.
    pub async fn test_connection(&self, spec: &ConnectionSpec) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = self.scoped(spec, |conn| async move { conn.ping().await }).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                info!("Health check passed in {}ms", latency_ms);
                HealthCheckResult {
                    connected: true,
                    latency_ms,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                HealthCheckResult {
                    connected: false,
                    latency_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn list_tables(&self, spec: &ConnectionSpec) -> Result<Vec<String>> {
        self.scoped(spec, |conn| async move { catalog::list_tables(conn.as_ref()).await })
            .await
    }

    pub async fn describe_table(&self, spec: &ConnectionSpec, table: &str) -> Result<TableSchema> {
        self.scoped(spec, |conn| async move {
            catalog::describe_table(conn.as_ref(), table).await
        })
        .await
    }

    /// Up to `preview_limit` rows of the selected columns (all when `columns`
    /// is empty).
    pub async fn preview<S: AsRef<str>>(
        &self,
        spec: &ConnectionSpec,
        table: &str,
        columns: &[S],
    ) -> Result<Preview> {
        let config = self.engine.config().clone();
        self.scoped(spec, |conn| async move {
            let schema = catalog::describe_table(conn.as_ref(), table).await?;
            let selection = project_or_all(&schema, columns)?;
            let opts = ReadOptions {
                table: table.to_string(),
                columns: selection.columns().to_vec(),
                batch_size: config.batch_size,
                read_ahead: config.read_ahead,
                limit: Some(config.preview_limit),
            };
            let mut rx = conn.read_rows(opts);
            let mut rows = Vec::new();
            while let Some(batch) = rx.recv().await {
                rows.extend(batch?.rows);
            }
            rows.truncate(config.preview_limit as usize);
            Ok(Preview {
                table: table.to_string(),
                columns: selection.columns().to_vec(),
                rows,
            })
        })
        .await
    }

    /// Export selected columns (all when `columns` is empty) of `table` to
    /// CSV. Without a destination the file goes to
    /// `<output_dir>/<table>_export.csv`.
    pub async fn export_to_file<S: AsRef<str>>(
        &self,
        spec: &ConnectionSpec,
        table: &str,
        columns: &[S],
        destination: Option<&Path>,
    ) -> Result<TransferResult> {
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.engine.config().default_export_path(table));
        let engine = &self.engine;
        self.scoped(spec, |conn| async move {
            let schema = catalog::describe_table(conn.as_ref(), table).await?;
            let selection = project_or_all(&schema, columns)?;
            engine
                .export_to_file(conn.as_ref(), table, &selection, &destination)
                .await
        })
        .await
    }

    /// Import a CSV file into `table`. See
    /// [`TransferEngine::import_from_file`] for the error tolerance rules.
    ///
    /// Not idempotent: every call appends the file's rows again, so
    /// re-running an import duplicates data.
    pub async fn import_from_file<S: AsRef<str>>(
        &self,
        spec: &ConnectionSpec,
        source: &Path,
        table: &str,
        columns: &[S],
    ) -> Result<TransferResult> {
        let engine = &self.engine;
        self.scoped(spec, |conn| async move {
            engine
                .import_from_file(conn.as_ref(), source, table, columns)
                .await
        })
        .await
    }
}
