//! Store driver implementations.
//!
//! - [`clickhouse`]: ClickHouse over its HTTP interface
//! - [`memory`]: In-process stand-in store with failure hooks, for tests
//!
//! Each driver implements [`StoreConnector`] and [`StoreConnection`]. The
//! rest of the crate never names a concrete driver except where a caller
//! chooses one (`Bridge::clickhouse`).
//!
//! [`StoreConnector`]: crate::core::traits::StoreConnector
//! [`StoreConnection`]: crate::core::traits::StoreConnection

pub mod clickhouse;
pub mod memory;

pub use clickhouse::{ClickhouseConnection, ClickhouseConnector, ClickhouseDialect};
pub use memory::{MemoryConnection, MemoryConnector};
