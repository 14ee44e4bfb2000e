//! Destination table provisioning for imports.
//!
//! An existing table is used as-is. A missing one is created from the file
//! header with one `Nullable(String)` column per header entry, so any file
//! can land without type inference. Callers wanting typed columns create the
//! table themselves beforehand.

use std::collections::HashSet;
use tracing::info;

use crate::core::identifier::validate_identifier;
use crate::core::schema::{ColumnDef, TableSchema};
use crate::core::traits::StoreConnection;
use crate::error::{BridgeError, Result};

/// Outcome of [`ensure_table`].
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// Schema of the destination table.
    pub schema: TableSchema,
    /// Whether the table was created by this call.
    pub created: bool,
}

/// Schema the provisioner would create for `header`.
pub fn schema_from_header(table: &str, header: &[String]) -> Result<TableSchema> {
    if header.is_empty() {
        return Err(BridgeError::invalid_selection(
            "<none>",
            "file has no header line",
        ));
    }
    let mut seen = HashSet::with_capacity(header.len());
    for name in header {
        if name.trim().is_empty() {
            return Err(BridgeError::invalid_selection(
                name,
                "header contains a blank column name",
            ));
        }
        validate_identifier(name)?;
        if !seen.insert(name.as_str()) {
            return Err(BridgeError::invalid_selection(
                name,
                "header repeats a column name",
            ));
        }
    }
    Ok(TableSchema::new(
        table,
        header.iter().map(ColumnDef::text).collect(),
    ))
}

/// Make sure `table` exists, creating it from `header` when absent and
/// `create_if_missing` is set.
pub async fn ensure_table(
    conn: &dyn StoreConnection,
    table: &str,
    header: &[String],
    create_if_missing: bool,
) -> Result<Provisioned> {
    validate_identifier(table)?;
    match conn.describe_table(table).await {
        Ok(schema) => Ok(Provisioned {
            schema,
            created: false,
        }),
        Err(BridgeError::NotFound { kind: "Table", .. }) if create_if_missing => {
            let schema = schema_from_header(table, header)?;
            conn.create_table(&schema).await?;
            info!(
                "{}: created with {} text columns from file header",
                table,
                schema.columns.len()
            );
            Ok(Provisioned {
                schema,
                created: true,
            })
        }
        Err(e) => Err(e),
    }
}
