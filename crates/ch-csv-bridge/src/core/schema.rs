//! Table and column metadata.
//!
//! These are read-only snapshots taken from the store for the duration of a
//! single request; nothing here is cached across calls.

use serde::Serialize;

use crate::typemap::{NativeType, FALLBACK_TEXT_TYPE};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,

    /// Declared store type (e.g., "UInt32", "Nullable(String)").
    #[serde(rename = "type")]
    pub type_name: String,

    /// Parsed form of `type_name`.
    #[serde(skip)]
    pub native: NativeType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: name.into(),
            native: NativeType::parse(&type_name),
            type_name,
        }
    }

    /// Column typed as the generic nullable text type.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FALLBACK_TEXT_TYPE)
    }
}

/// Table metadata: name plus ordered columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions in store order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Find a column by exact (case-sensitive) name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column by exact name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Ordered, duplicate-free subset of a table's columns.
///
/// Only produced by the projector, so every column is known to exist in the
/// schema it was validated against. The order here is the order cells are
/// read and written in, independent of the store's column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelection {
    columns: Vec<ColumnDef>,
}

impl ColumnSelection {
    pub(crate) fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
