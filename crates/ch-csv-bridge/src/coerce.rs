//! Conversion between store values and file text.
//!
//! Store→file: [`TypeCoercer::to_text`] renders a [`Value`] in a fixed
//! canonical form. File→store: [`TypeCoercer::to_native`] parses text into
//! the [`Value`] variant the destination column requires, or reports a
//! [`RowError`] naming the row, column and raw text.
//!
//! Canonical text forms:
//!
//! | Type        | Form                                            |
//! |-------------|-------------------------------------------------|
//! | NULL        | null marker (default `\N`)                      |
//! | integers    | base 10                                         |
//! | floats      | shortest round-trip decimal, `nan`, `inf`, `-inf` |
//! | decimals    | exact decimal string                            |
//! | Bool        | `true` / `false`                                |
//! | Date        | `YYYY-MM-DD`                                    |
//! | DateTime    | `YYYY-MM-DD HH:MM:SS[.f]`, fraction only for DateTime64 |
//! | UUID        | hyphenated lowercase                            |

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::schema::ColumnDef;
use crate::core::value::Value;
use crate::error::RowError;
use crate::typemap::NativeType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_PARSE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Default text written for NULL: the store's own TSV/CSV convention.
pub const DEFAULT_NULL_MARKER: &str = "\\N";

/// Bidirectional value/text converter.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    null_marker: String,
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_MARKER)
    }
}

impl TypeCoercer {
    pub fn new(null_marker: impl Into<String>) -> Self {
        Self {
            null_marker: null_marker.into(),
        }
    }

    pub fn null_marker(&self) -> &str {
        &self.null_marker
    }

    /// Render a value for the file. `native` supplies formatting details the
    /// value alone lacks (DateTime precision).
    pub fn to_text(&self, value: &Value, native: &NativeType) -> String {
        match value {
            Value::Null => self.null_marker.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Decimal(d) => d.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => match native.base() {
                NativeType::DateTime { precision } if *precision > 0 => {
                    let base = dt.format(DATETIME_FORMAT).to_string();
                    let nanos = format!("{:09}", dt.nanosecond());
                    let digits = (*precision as usize).min(9);
                    format!("{}.{}", base, &nanos[..digits])
                }
                _ => dt.format(DATETIME_FORMAT).to_string(),
            },
            Value::Uuid(u) => u.hyphenated().to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Parse file text into the destination column's value.
    pub fn to_native(&self, text: &str, column: &ColumnDef, row: u64) -> Result<Value, RowError> {
        let fail = |reason: String| RowError::new(row, &column.name, text, reason);

        if text == self.null_marker {
            if column.native.is_nullable() {
                return Ok(Value::Null);
            }
            return Err(fail(format!(
                "NULL given for non-nullable column of type {}",
                column.type_name
            )));
        }

        let trimmed = text.trim();
        let value = match column.native.base() {
            NativeType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(fail("expected true/false or 1/0".to_string())),
            },
            NativeType::Int { bits } => {
                let v: i64 = trimmed
                    .parse()
                    .map_err(|e| fail(format!("not an integer: {}", e)))?;
                let bits = u32::from(*bits);
                if bits < 64 {
                    let max = (1i64 << (bits - 1)) - 1;
                    let min = -(1i64 << (bits - 1));
                    if v < min || v > max {
                        return Err(fail(format!("out of range for Int{}", bits)));
                    }
                }
                Value::Int(v)
            }
            NativeType::UInt { bits } => {
                let v: u64 = trimmed
                    .parse()
                    .map_err(|e| fail(format!("not an unsigned integer: {}", e)))?;
                let bits = u32::from(*bits);
                if bits < 64 && v > (1u64 << bits) - 1 {
                    return Err(fail(format!("out of range for UInt{}", bits)));
                }
                Value::UInt(v)
            }
            NativeType::Float { .. } => Value::Float(
                parse_float(trimmed).ok_or_else(|| fail("not a number".to_string()))?,
            ),
            NativeType::Decimal { scale, .. } => {
                let d = Decimal::from_str(trimmed)
                    .or_else(|_| Decimal::from_scientific(trimmed))
                    .map_err(|e| fail(format!("not a decimal: {}", e)))?;
                if d.scale() > *scale {
                    return Err(fail(format!("more than {} fractional digits", scale)));
                }
                Value::Decimal(d)
            }
            NativeType::Date => Value::Date(
                NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                    .map_err(|e| fail(format!("expected YYYY-MM-DD: {}", e)))?,
            ),
            NativeType::DateTime { .. } => Value::DateTime(
                DATETIME_PARSE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
                    .ok_or_else(|| fail("expected YYYY-MM-DD HH:MM:SS".to_string()))?,
            ),
            NativeType::Uuid => Value::Uuid(
                Uuid::parse_str(trimmed).map_err(|e| fail(format!("not a UUID: {}", e)))?,
            ),
            NativeType::FixedString(n) => {
                if text.len() > *n {
                    return Err(fail(format!("longer than FixedString({})", n)));
                }
                Value::Text(text.to_string())
            }
            // Strings keep surrounding whitespace.
            _ => Value::Text(text.to_string()),
        };
        Ok(value)
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "inf" } else { "-inf" }).to_string()
    } else {
        v.to_string()
    }
}

fn parse_float(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "nan" | "-nan" | "+nan" => Some(f64::NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coercer() -> TypeCoercer {
        TypeCoercer::default()
    }

    #[test]
    fn test_null_is_distinct_from_empty_string() {
        let c = coercer();
        let t = NativeType::parse("Nullable(String)");
        assert_eq!(c.to_text(&Value::Null, &t), "\\N");
        assert_eq!(c.to_text(&Value::Text(String::new()), &t), "");

        let col = ColumnDef::new("note", "Nullable(String)");
        assert_eq!(c.to_native("\\N", &col, 1).unwrap(), Value::Null);
        assert_eq!(c.to_native("", &col, 1).unwrap(), Value::Text(String::new()));
    }

    #[test]
    fn test_null_for_non_nullable_column_fails() {
        let col = ColumnDef::new("id", "UInt32");
        let err = coercer().to_native("\\N", &col, 4).unwrap_err();
        assert_eq!(err.row, 4);
        assert_eq!(err.column, "id");
    }

    #[test]
    fn test_float_canonical_forms() {
        let c = coercer();
        let t = NativeType::Float { bits: 64 };
        assert_eq!(c.to_text(&Value::Float(1.5), &t), "1.5");
        assert_eq!(c.to_text(&Value::Float(0.1), &t), "0.1");
        assert_eq!(c.to_text(&Value::Float(f64::NAN), &t), "nan");
        assert_eq!(c.to_text(&Value::Float(f64::NEG_INFINITY), &t), "-inf");
    }

    #[test]
    fn test_datetime_fraction_follows_precision() {
        let c = coercer();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 120)
            .unwrap();
        assert_eq!(
            c.to_text(&Value::DateTime(dt), &NativeType::parse("DateTime")),
            "2024-01-02 03:04:05"
        );
        assert_eq!(
            c.to_text(&Value::DateTime(dt), &NativeType::parse("DateTime64(3)")),
            "2024-01-02 03:04:05.120"
        );
        assert_eq!(
            c.to_text(&Value::DateTime(dt), &NativeType::parse("Nullable(DateTime64(6))")),
            "2024-01-02 03:04:05.120000"
        );
    }

    #[test]
    fn test_integer_range_checks() {
        let c = coercer();
        let col = ColumnDef::new("n", "Int8");
        assert_eq!(c.to_native("-128", &col, 1).unwrap(), Value::Int(-128));
        assert!(c.to_native("128", &col, 1).is_err());

        let col = ColumnDef::new("n", "UInt16");
        assert_eq!(c.to_native(" 65535 ", &col, 1).unwrap(), Value::UInt(65535));
        assert!(c.to_native("65536", &col, 1).is_err());
        assert!(c.to_native("-1", &col, 1).is_err());
    }

    #[test]
    fn test_malformed_integer_reports_raw_text() {
        let col = ColumnDef::new("age", "Int32");
        let err = coercer().to_native("abc", &col, 7).unwrap_err();
        assert_eq!(err.row, 7);
        assert_eq!(err.raw, "abc");
        assert!(err.reason.contains("not an integer"));
    }

    #[test]
    fn test_decimal_scale_is_enforced() {
        let c = coercer();
        let col = ColumnDef::new("price", "Decimal(10, 2)");
        assert_eq!(
            c.to_native("12.30", &col, 1).unwrap(),
            Value::Decimal(Decimal::from_str("12.30").unwrap())
        );
        assert!(c.to_native("1.234", &col, 1).is_err());
    }

    #[test]
    fn test_wide_decimals_round_trip_as_text() {
        let c = coercer();
        for (type_name, raw) in [
            ("Decimal(38, 2)", "123456789012345678901234567890.12"),
            ("Decimal(38, 30)", "1.123456789012345678901234567891"),
        ] {
            let col = ColumnDef::new("amount", type_name);
            let value = c.to_native(raw, &col, 1).unwrap();
            assert_eq!(value, Value::Text(raw.to_string()));
            assert_eq!(c.to_text(&value, &col.native), raw);
        }
    }

    #[test]
    fn test_bool_and_temporal_parsing() {
        let c = coercer();
        let col = ColumnDef::new("flag", "Bool");
        assert_eq!(c.to_native("TRUE", &col, 1).unwrap(), Value::Bool(true));
        assert_eq!(c.to_native("0", &col, 1).unwrap(), Value::Bool(false));

        let col = ColumnDef::new("ts", "DateTime");
        assert!(c.to_native("2024-01-02 03:04:05", &col, 1).is_ok());
        assert!(c.to_native("2024-01-02T03:04:05.5", &col, 1).is_ok());
        assert!(c.to_native("02/01/2024", &col, 1).is_err());
    }

    #[test]
    fn test_unknown_types_pass_through_as_text() {
        let col = ColumnDef::new("tags", "Array(String)");
        assert_eq!(
            coercer().to_native("['a']", &col, 1).unwrap(),
            Value::Text("['a']".to_string())
        );
    }

    #[test]
    fn test_custom_null_marker() {
        let c = TypeCoercer::new("NULL");
        let col = ColumnDef::new("x", "Nullable(Int64)");
        assert_eq!(c.to_native("NULL", &col, 1).unwrap(), Value::Null);
        assert_eq!(c.to_text(&Value::Null, &col.native), "NULL");
    }
}
