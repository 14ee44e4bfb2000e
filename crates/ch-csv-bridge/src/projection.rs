//! Column selection validation.

use std::collections::HashSet;

use crate::core::schema::{ColumnSelection, TableSchema};
use crate::error::{BridgeError, Result};

/// Validate `requested` against `schema` and return the selection in the
/// caller's order.
///
/// Names match exactly (case-sensitive). Fails with
/// `BridgeError::InvalidSelection` naming the first offending column when the
/// request is empty, names an unknown column, or repeats a column.
pub fn project<S: AsRef<str>>(schema: &TableSchema, requested: &[S]) -> Result<ColumnSelection> {
    if requested.is_empty() {
        return Err(BridgeError::invalid_selection(
            "<none>",
            "at least one column must be selected",
        ));
    }

    let mut seen = HashSet::with_capacity(requested.len());
    let mut columns = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.as_ref();
        let col = schema.column(name).ok_or_else(|| {
            BridgeError::invalid_selection(
                name,
                format!("no such column in table '{}'", schema.name),
            )
        })?;
        if !seen.insert(name) {
            return Err(BridgeError::invalid_selection(name, "column selected more than once"));
        }
        columns.push(col.clone());
    }

    Ok(ColumnSelection::new(columns))
}

/// Select every column of `schema` in store order.
pub fn project_all(schema: &TableSchema) -> Result<ColumnSelection> {
    if schema.columns.is_empty() {
        return Err(BridgeError::invalid_selection(
            "<none>",
            format!("table '{}' has no columns", schema.name),
        ));
    }
    Ok(ColumnSelection::new(schema.columns.clone()))
}

/// [`project`] when `requested` is non-empty, otherwise [`project_all`].
pub fn project_or_all<S: AsRef<str>>(
    schema: &TableSchema,
    requested: &[S],
) -> Result<ColumnSelection> {
    if requested.is_empty() {
        project_all(schema)
    } else {
        project(schema, requested)
    }
}
