//! Schema discovery.
//!
//! Thin, read-only wrappers over the connection: one round trip each, no
//! retries, no caching. Schemas are snapshots valid for the current request.

use tracing::debug;

use crate::core::identifier::validate_identifier;
use crate::core::schema::TableSchema;
use crate::core::traits::StoreConnection;
use crate::error::Result;

/// List the tables in the connection's database.
pub async fn list_tables(conn: &dyn StoreConnection) -> Result<Vec<String>> {
    let tables = conn.list_tables().await?;
    debug!("Found {} tables", tables.len());
    Ok(tables)
}

/// Describe one table. Fails with `NotFound` if it does not exist.
pub async fn describe_table(conn: &dyn StoreConnection, table: &str) -> Result<TableSchema> {
    validate_identifier(table)?;
    let schema = conn.describe_table(table).await?;
    debug!("{}: {} columns", table, schema.columns.len());
    Ok(schema)
}
