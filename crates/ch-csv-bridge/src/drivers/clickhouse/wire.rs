//! `JSONCompactEachRow` codec.
//!
//! Each line on the wire is a JSON array with one element per selected
//! column. Reads are issued with 64-bit integers, decimals and non-finite
//! floats quoted, so those arrive as JSON strings and are parsed here
//! without precision loss.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{json, Value as Json};
use std::str::FromStr;
use uuid::Uuid;

use crate::core::schema::ColumnDef;
use crate::core::value::{Row, Value};
use crate::error::{BridgeError, Result};
use crate::typemap::NativeType;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Decode one wire line into a row aligned to `columns`.
pub fn decode_line(line: &str, columns: &[ColumnDef]) -> Result<Row> {
    let cells: Vec<Json> = serde_json::from_str(line)?;
    if cells.len() != columns.len() {
        return Err(BridgeError::store(
            None,
            format!(
                "row has {} fields, expected {}",
                cells.len(),
                columns.len()
            ),
        ));
    }
    cells
        .into_iter()
        .zip(columns)
        .map(|(cell, col)| decode_cell(cell, col))
        .collect()
}

fn decode_cell(cell: Json, col: &ColumnDef) -> Result<Value> {
    if cell.is_null() {
        return Ok(Value::Null);
    }
    let bad = |cell: &Json| {
        BridgeError::store(
            None,
            format!(
                "unexpected value {} for column '{}' of type {}",
                cell, col.name, col.type_name
            ),
        )
    };

    let value = match col.native.base() {
        NativeType::Bool => match &cell {
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Bool(n.as_u64().map(|v| v != 0).ok_or_else(|| bad(&cell))?),
            _ => return Err(bad(&cell)),
        },
        NativeType::Int { .. } => match &cell {
            Json::Number(n) => Value::Int(n.as_i64().ok_or_else(|| bad(&cell))?),
            Json::String(s) => Value::Int(s.parse().map_err(|_| bad(&cell))?),
            _ => return Err(bad(&cell)),
        },
        NativeType::UInt { .. } => match &cell {
            Json::Number(n) => Value::UInt(n.as_u64().ok_or_else(|| bad(&cell))?),
            Json::String(s) => Value::UInt(s.parse().map_err(|_| bad(&cell))?),
            _ => return Err(bad(&cell)),
        },
        NativeType::Float { .. } => match &cell {
            Json::Number(n) => Value::Float(n.as_f64().ok_or_else(|| bad(&cell))?),
            Json::String(s) => Value::Float(parse_float(s).ok_or_else(|| bad(&cell))?),
            _ => return Err(bad(&cell)),
        },
        NativeType::Decimal { .. } => match &cell {
            Json::String(s) => Value::Decimal(Decimal::from_str(s).map_err(|_| bad(&cell))?),
            Json::Number(n) => {
                Value::Decimal(Decimal::from_str(&n.to_string()).map_err(|_| bad(&cell))?)
            }
            _ => return Err(bad(&cell)),
        },
        NativeType::Date => match &cell {
            Json::String(s) => {
                Value::Date(NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| bad(&cell))?)
            }
            _ => return Err(bad(&cell)),
        },
        NativeType::DateTime { .. } => match &cell {
            Json::String(s) => Value::DateTime(
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|_| bad(&cell))?,
            ),
            _ => return Err(bad(&cell)),
        },
        NativeType::Uuid => match &cell {
            Json::String(s) => Value::Uuid(Uuid::parse_str(s).map_err(|_| bad(&cell))?),
            _ => return Err(bad(&cell)),
        },
        // Text-carried types. Composite values (arrays, maps, tuples) keep
        // their JSON rendering.
        _ => match cell {
            Json::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        },
    };
    Ok(value)
}

/// Parse a float as ClickHouse renders it, including `nan`, `inf` and `-inf`.
pub(crate) fn parse_float(s: &str) -> Option<f64> {
    match s {
        "nan" | "NaN" | "-nan" => Some(f64::NAN),
        "inf" | "+inf" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

/// Encode one row as a wire line (without the trailing newline).
pub fn encode_row(row: &[Value]) -> String {
    let cells: Vec<Json> = row.iter().map(encode_cell).collect();
    Json::Array(cells).to_string()
}

fn encode_cell(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Float(v) if v.is_nan() => json!("nan"),
        Value::Float(v) if v.is_infinite() && *v > 0.0 => json!("inf"),
        Value::Float(v) if v.is_infinite() => json!("-inf"),
        Value::Float(v) => json!(v),
        Value::Decimal(d) => json!(d.to_string()),
        Value::Date(d) => json!(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => json!(dt.format(DATETIME_FORMAT).to_string()),
        Value::Uuid(u) => json!(u.hyphenated().to_string()),
        Value::Text(s) => json!(s),
    }
}
