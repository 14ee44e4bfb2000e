//! In-process store.
//!
//! Implements the same connector/connection contract as the ClickHouse
//! driver against tables held in memory. It is the stand-in store for the
//! test suites; no CLI path uses it. Failure hooks (unreachable endpoint,
//! credential checks, read failures) let tests exercise error paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::config::{ConnectionSpec, Credential};
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::{ReadOptions, StoreConnection, StoreConnector};
use crate::core::value::{Row, RowBatch};
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct MemoryTable {
    schema: Vec<ColumnDef>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// database -> table -> contents
    databases: HashMap<String, HashMap<String, MemoryTable>>,
    unreachable: bool,
    password: Option<String>,
    fail_reads_after: Option<usize>,
    fail_inserts: bool,
    created: Vec<String>,
    insert_calls: usize,
}

/// Shared in-memory store. Clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Create (or replace) a table with the given columns and rows.
    pub fn seed_table(&self, database: &str, schema: TableSchema, rows: Vec<Row>) {
        let mut state = self.lock();
        state.databases.entry(database.to_string()).or_default().insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.columns,
                rows,
            },
        );
    }

    /// Register an empty database.
    pub fn add_database(&self, database: &str) {
        self.lock().databases.entry(database.to_string()).or_default();
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, database: &str, table: &str) -> Option<Vec<Row>> {
        self.lock()
            .databases
            .get(database)
            .and_then(|db| db.get(table))
            .map(|t| t.rows.clone())
    }

    /// Snapshot of a table's schema.
    pub fn schema(&self, database: &str, table: &str) -> Option<TableSchema> {
        self.lock()
            .databases
            .get(database)
            .and_then(|db| db.get(table))
            .map(|t| TableSchema::new(table, t.schema.clone()))
    }

    /// Tables created through `create_table`, in order.
    pub fn created_tables(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    /// Number of `insert_batch` calls that reached the store.
    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    /// Make every connect attempt fail with a connection error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Require this password on connect.
    pub fn require_password(&self, password: impl Into<String>) {
        self.lock().password = Some(password.into());
    }

    /// Fail streaming reads after `batches` batches have been delivered.
    pub fn fail_reads_after(&self, batches: usize) {
        self.lock().fail_reads_after = Some(batches);
    }

    /// Make every insert fail with a store error.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.lock().fail_inserts = fail;
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    // A panic while holding the lock leaves plain data behind; keep going.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn StoreConnection>> {
        {
            let state = self.lock();
            if state.unreachable {
                return Err(BridgeError::Connection(format!(
                    "cannot reach {}:{}",
                    spec.host, spec.port
                )));
            }
            if let Some(expected) = &state.password {
                let ok = matches!(spec.credential(), Credential::Password(p) if p == expected.as_str());
                if !ok {
                    return Err(BridgeError::Connection(format!(
                        "authentication rejected for user {}",
                        spec.user
                    )));
                }
            }
            if !state.databases.contains_key(&spec.database) {
                return Err(BridgeError::NotFound {
                    kind: "Database",
                    name: spec.database.clone(),
                });
            }
        }
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            database: spec.database.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

/// Connection to a [`MemoryConnector`] database.
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    database: String,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Connection("connection closed".into()));
        }
        Ok(())
    }

    /// Snapshot selected columns of a table, positionally aligned to `columns`.
    fn project_rows(&self, opts: &ReadOptions) -> Result<Vec<Row>> {
        let state = lock_state(&self.state);
        let table = state
            .databases
            .get(&self.database)
            .and_then(|db| db.get(&opts.table))
            .ok_or_else(|| BridgeError::table_not_found(&opts.table))?;

        let positions = opts
            .columns
            .iter()
            .map(|c| {
                table
                    .schema
                    .iter()
                    .position(|s| s.name == c.name)
                    .ok_or_else(|| unknown_column(&c.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = opts.limit.map_or(usize::MAX, |n| n as usize);
        Ok(table
            .rows
            .iter()
            .take(limit)
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }
}

fn unknown_column(name: &str) -> BridgeError {
    BridgeError::store(Some(47), format!("Missing columns: '{}'", name))
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&self) -> Result<()> {
        self.check_open()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.check_open()?;
        let state = lock_state(&self.state);
        let mut names: Vec<String> = state
            .databases
            .get(&self.database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        self.check_open()?;
        let state = lock_state(&self.state);
        state
            .databases
            .get(&self.database)
            .and_then(|db| db.get(table))
            .map(|t| TableSchema::new(table, t.schema.clone()))
            .ok_or_else(|| BridgeError::table_not_found(table))
    }

    fn read_rows(&self, opts: ReadOptions) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        let snapshot = self.check_open().and_then(|_| self.project_rows(&opts));
        let fail_after = lock_state(&self.state).fail_reads_after;
        let closed = self.closed.clone();
        let batch_size = opts.batch_size.max(1);

        tokio::spawn(async move {
            let rows = match snapshot {
                Ok(rows) => rows,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            for (sent, chunk) in rows.chunks(batch_size).enumerate() {
                if closed.load(Ordering::SeqCst) {
                    let _ = tx
                        .send(Err(BridgeError::Connection("connection closed".into())))
                        .await;
                    return;
                }
                if fail_after == Some(sent) {
                    let _ = tx
                        .send(Err(BridgeError::store(Some(241), "read failed mid-stream")))
                        .await;
                    return;
                }
                if tx.send(Ok(RowBatch::new(chunk.to_vec()))).await.is_err() {
                    return;
                }
            }
        });

        rx
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        let db = state.databases.entry(self.database.clone()).or_default();
        if db.contains_key(&schema.name) {
            return Ok(());
        }
        db.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.columns.clone(),
                rows: Vec::new(),
            },
        );
        state.created.push(schema.name.clone());
        Ok(())
    }

    async fn insert_batch(&self, table: &str, columns: &[ColumnDef], rows: Vec<Row>) -> Result<u64> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.insert_calls += 1;
        if state.fail_inserts {
            return Err(BridgeError::store(Some(252), "Too many parts"));
        }
        let target = state
            .databases
            .get_mut(&self.database)
            .and_then(|db| db.get_mut(table))
            .ok_or_else(|| BridgeError::table_not_found(table))?;

        let positions = columns
            .iter()
            .map(|c| {
                target
                    .schema
                    .iter()
                    .position(|s| s.name == c.name)
                    .ok_or_else(|| unknown_column(&c.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let width = target.schema.len();
        let count = rows.len() as u64;
        for row in rows {
            // Columns not named in the insert get NULL.
            let mut full = vec![crate::core::value::Value::Null; width];
            for (value, &pos) in row.into_iter().zip(&positions) {
                full[pos] = value;
            }
            target.rows.push(full);
        }
        Ok(count)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;

    fn spec() -> ConnectionSpec {
        ConnectionSpec::new("localhost", 8123, "default", "default")
    }

    fn seeded() -> MemoryConnector {
        let store = MemoryConnector::new();
        store.seed_table(
            "default",
            TableSchema::new(
                "people",
                vec![ColumnDef::new("id", "UInt32"), ColumnDef::new("name", "String")],
            ),
            (1..=5u64)
                .map(|i| vec![Value::UInt(i), Value::Text(format!("p{}", i))])
                .collect(),
        );
        store
    }

    #[tokio::test]
    async fn test_read_rows_projects_and_batches() {
        let store = seeded();
        let conn = store.connect(&spec()).await.unwrap();
        let mut opts = ReadOptions::new("people", vec![ColumnDef::new("name", "String")]);
        opts.batch_size = 2;
        let mut rx = conn.read_rows(opts);

        let mut sizes = Vec::new();
        while let Some(batch) = rx.recv().await {
            sizes.push(batch.unwrap().len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_unknown_database_and_credentials() {
        let store = seeded();
        let mut s = spec();
        s.database = "nope".into();
        assert!(matches!(
            store.connect(&s).await.err().unwrap(),
            BridgeError::NotFound { .. }
        ));

        store.require_password("pw");
        assert!(matches!(
            store.connect(&spec()).await.err().unwrap(),
            BridgeError::Connection(_)
        ));
        assert!(store.connect(&spec().with_password("pw")).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_connection_refuses_calls() {
        let store = seeded();
        let conn = store.connect(&spec()).await.unwrap();
        conn.close().await;
        assert!(matches!(
            conn.list_tables().await.unwrap_err(),
            BridgeError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn test_insert_fills_missing_columns_with_null() {
        let store = seeded();
        let conn = store.connect(&spec()).await.unwrap();
        conn.insert_batch(
            "people",
            &[ColumnDef::new("name", "String")],
            vec![vec![Value::Text("zed".into())]],
        )
        .await
        .unwrap();
        let rows = store.rows("default", "people").unwrap();
        assert_eq!(rows[5], vec![Value::Null, Value::Text("zed".into())]);
    }
}
