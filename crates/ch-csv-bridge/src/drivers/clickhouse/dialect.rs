//! ClickHouse SQL dialect (Strategy pattern).
//!
//! Builds every statement the driver sends. Identifiers always go through
//! [`quote_ident`]; no user-supplied value is ever interpolated unquoted.

use crate::core::identifier::{quote_ident, quote_list};
use crate::core::schema::{ColumnDef, TableSchema};
use crate::error::{BridgeError, Result};

/// Row format used on the wire in both directions.
pub const WIRE_FORMAT: &str = "JSONCompactEachRow";

/// Engine clause for provisioned tables. No sorting key: rows keep
/// insertion order within a part and no column is privileged.
const PROVISION_ENGINE: &str = "ENGINE = MergeTree ORDER BY tuple()";

/// ClickHouse dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct ClickhouseDialect;

impl ClickhouseDialect {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "clickhouse"
    }

    pub fn ping_query(&self) -> String {
        "SELECT 1".to_string()
    }

    /// Tables of the session database (selected by the `database` URL parameter).
    pub fn list_tables_query(&self) -> String {
        format!(
            "SELECT name FROM system.tables WHERE database = currentDatabase() ORDER BY name FORMAT {}",
            WIRE_FORMAT
        )
    }

    /// `DESCRIBE TABLE` yields `[name, type, default_type, ...]` per column in
    /// declaration order, and fails with code 60 when the table is absent.
    pub fn describe_query(&self, table: &str) -> Result<String> {
        Ok(format!(
            "DESCRIBE TABLE {} FORMAT {}",
            quote_ident(table)?,
            WIRE_FORMAT
        ))
    }

    pub fn select_query(
        &self,
        table: &str,
        columns: &[ColumnDef],
        limit: Option<u64>,
    ) -> Result<String> {
        if columns.is_empty() {
            return Err(BridgeError::invalid_selection(
                "<none>",
                "at least one column must be selected",
            ));
        }
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let mut sql = format!("SELECT {} FROM {}", quote_list(&names)?, quote_ident(table)?);
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        sql.push_str(&format!(" FORMAT {}", WIRE_FORMAT));
        Ok(sql)
    }

    pub fn create_table_query(&self, schema: &TableSchema) -> Result<String> {
        if schema.columns.is_empty() {
            return Err(BridgeError::invalid_selection(
                "<none>",
                "cannot create a table without columns",
            ));
        }
        let cols = schema
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.type_name)))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) {}",
            quote_ident(&schema.name)?,
            cols.join(", "),
            PROVISION_ENGINE
        ))
    }

    /// Statement prefix for an insert whose rows travel in the request body.
    pub fn insert_query(&self, table: &str, columns: &[ColumnDef]) -> Result<String> {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        Ok(format!(
            "INSERT INTO {} ({}) FORMAT {}",
            quote_ident(table)?,
            quote_list(&names)?,
            WIRE_FORMAT
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_query_basic() {
        let d = ClickhouseDialect::new();
        let cols = vec![ColumnDef::new("name", "String"), ColumnDef::new("id", "UInt32")];
        let sql = d.select_query("users", &cols, None).unwrap();
        assert_eq!(
            sql,
            "SELECT `name`, `id` FROM `users` FORMAT JSONCompactEachRow"
        );
    }

    #[test]
    fn test_list_tables_query_scopes_to_current_database() {
        let sql = ClickhouseDialect::new().list_tables_query();
        assert_eq!(
            sql,
            "SELECT name FROM system.tables WHERE database = currentDatabase() ORDER BY name FORMAT JSONCompactEachRow"
        );
    }

    #[test]
    fn test_select_query_with_limit() {
        let d = ClickhouseDialect::new();
        let cols = vec![ColumnDef::new("id", "UInt32")];
        let sql = d.select_query("users", &cols, Some(100)).unwrap();
        assert!(sql.contains(" LIMIT 100 FORMAT"));
    }

    #[test]
    fn test_select_query_requires_columns() {
        let d = ClickhouseDialect::new();
        assert!(d.select_query("users", &[], None).is_err());
    }

    #[test]
    fn test_create_table_query() {
        let d = ClickhouseDialect::new();
        let schema = TableSchema::new(
            "people",
            vec![ColumnDef::text("id"), ColumnDef::text("full name")],
        );
        let sql = d.create_table_query(&schema).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `people` (`id` Nullable(String), `full name` Nullable(String)) \
             ENGINE = MergeTree ORDER BY tuple()"
        );
    }

    #[test]
    fn test_insert_query_quotes_hostile_names() {
        let d = ClickhouseDialect::new();
        let cols = vec![ColumnDef::text("a`b")];
        let sql = d.insert_query("t", &cols).unwrap();
        assert_eq!(sql, "INSERT INTO `t` (`a\\`b`) FORMAT JSONCompactEachRow");
    }

    #[test]
    fn test_describe_rejects_empty_table_name() {
        let d = ClickhouseDialect::new();
        assert!(d.describe_query("").is_err());
    }
}
