//! # ch-csv-bridge
//!
//! Bidirectional transfer between ClickHouse tables and CSV files.
//!
//! This library provides:
//!
//! - **Schema discovery**: list tables and describe their columns
//! - **Column projection**: validated, order-preserving column subsets
//! - **Export**: stream a table (or a column subset) into a CSV file
//! - **Import**: load a CSV file into a table, creating it from the header
//!   when absent, with per-batch error tolerance
//! - **Type coercion** between ClickHouse types and a canonical text form
//!
//! ## Example
//!
//! ```rust,no_run
//! use ch_csv_bridge::{Bridge, Config};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("bridge.yaml")?;
//!     let bridge = Bridge::clickhouse(config.transfer.clone());
//!     let result = bridge
//!         .export_to_file(&config.connection, "events", &["id", "ts"], Some(Path::new("events.csv")))
//!         .await?;
//!     println!("Exported {} rows", result.rows_processed);
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod catalog;
pub mod coerce;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod file;
pub mod projection;
pub mod provision;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use bridge::{Bridge, HealthCheckResult, Preview};
pub use coerce::TypeCoercer;
pub use config::{Config, ConnectionSpec, TransferConfig};
pub use crate::core::{ColumnDef, ColumnSelection, Row, RowBatch, TableSchema, Value};
pub use crate::core::{ReadOptions, StoreConnection, StoreConnector};
pub use drivers::{ClickhouseConnector, MemoryConnector};
pub use error::{BridgeError, Result, RowError};
pub use transfer::{TransferEngine, TransferResult, TransferStatus};
pub use typemap::NativeType;
