//! Core abstractions shared by drivers and the transfer pipeline.
//!
//! - [`schema`]: Table, column and column-selection metadata
//! - [`value`]: Tagged cell values and row batches
//! - [`traits`]: Store connector/connection capability traits
//! - [`identifier`]: Identifier validation and quoting
//!
//! Drivers (`drivers/clickhouse`, `drivers/memory`) implement the traits; the
//! catalog, provisioner and transfer engine are written against them only.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnDef, ColumnSelection, TableSchema};
pub use traits::{ReadOptions, StoreConnection, StoreConnector};
pub use value::{Row, RowBatch, Value};
