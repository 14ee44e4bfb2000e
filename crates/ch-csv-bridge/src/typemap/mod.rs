//! Native store type parsing.
//!
//! ClickHouse reports column types as strings (`Nullable(UInt32)`,
//! `DateTime64(3, 'UTC')`, ...). [`NativeType::parse`] turns them into a closed
//! set of shapes the coercer knows how to render and parse. Anything outside
//! that set becomes [`NativeType::Other`] and is moved as text.

/// Type given to every column of a table provisioned from a file header.
pub const FALLBACK_TEXT_TYPE: &str = "Nullable(String)";

/// Widest precision and scale held exactly by `rust_decimal::Decimal`.
pub const MAX_DECIMAL_DIGITS: u32 = 28;

/// Parsed store column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Bool,
    /// Signed integer of the given bit width (8..=64).
    Int { bits: u8 },
    /// Unsigned integer of the given bit width (8..=64).
    UInt { bits: u8 },
    /// Floating point of the given bit width (32 or 64).
    Float { bits: u8 },
    Decimal { precision: u32, scale: u32 },
    String,
    FixedString(usize),
    Uuid,
    Date,
    /// DateTime / DateTime64 with sub-second digits.
    DateTime { precision: u32 },
    Enum,
    Nullable(Box<NativeType>),
    /// Unsupported or unknown type, handled as variable-length text.
    Other(String),
}

impl NativeType {
    /// Parse a store type string.
    pub fn parse(type_name: &str) -> Self {
        let t = type_name.trim();

        if let Some(inner) = unwrap_call(t, "Nullable") {
            return NativeType::Nullable(Box::new(NativeType::parse(inner)));
        }
        // LowCardinality only changes storage, not values.
        if let Some(inner) = unwrap_call(t, "LowCardinality") {
            return NativeType::parse(inner);
        }

        match t {
            "Bool" | "Boolean" => return NativeType::Bool,
            "Int8" => return NativeType::Int { bits: 8 },
            "Int16" => return NativeType::Int { bits: 16 },
            "Int32" => return NativeType::Int { bits: 32 },
            "Int64" => return NativeType::Int { bits: 64 },
            "UInt8" => return NativeType::UInt { bits: 8 },
            "UInt16" => return NativeType::UInt { bits: 16 },
            "UInt32" => return NativeType::UInt { bits: 32 },
            "UInt64" => return NativeType::UInt { bits: 64 },
            "Float32" => return NativeType::Float { bits: 32 },
            "Float64" => return NativeType::Float { bits: 64 },
            "String" => return NativeType::String,
            "UUID" => return NativeType::Uuid,
            "Date" | "Date32" => return NativeType::Date,
            "DateTime" => return NativeType::DateTime { precision: 0 },
            _ => {}
        }

        if let Some(args) = unwrap_call(t, "Decimal") {
            let mut parts = args.split(',').map(str::trim);
            let precision = parts.next().and_then(|p| p.parse().ok());
            let scale = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            if let Some(precision) = precision {
                return decimal(t, precision, scale);
            }
        }
        for (name, precision) in [
            ("Decimal32", 9),
            ("Decimal64", 18),
            ("Decimal128", 38),
            ("Decimal256", 76),
        ] {
            if let Some(scale) = unwrap_call(t, name).and_then(|s| s.trim().parse().ok()) {
                return decimal(t, precision, scale);
            }
        }
        if let Some(n) = unwrap_call(t, "FixedString").and_then(|n| n.trim().parse().ok()) {
            return NativeType::FixedString(n);
        }
        // DateTime('Europe/Berlin')
        if unwrap_call(t, "DateTime").is_some() {
            return NativeType::DateTime { precision: 0 };
        }
        if let Some(args) = unwrap_call(t, "DateTime64") {
            let precision = args
                .split(',')
                .next()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(3);
            return NativeType::DateTime { precision };
        }
        if unwrap_call(t, "Enum8").is_some() || unwrap_call(t, "Enum16").is_some() {
            return NativeType::Enum;
        }

        NativeType::Other(t.to_string())
    }

    /// Whether the column accepts NULL.
    pub fn is_nullable(&self) -> bool {
        matches!(self, NativeType::Nullable(_))
    }

    /// The type with any `Nullable` wrapper removed.
    pub fn base(&self) -> &NativeType {
        match self {
            NativeType::Nullable(inner) => inner.base(),
            other => other,
        }
    }

    /// Whether values of this type are carried as plain text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self.base(),
            NativeType::String | NativeType::FixedString(_) | NativeType::Enum | NativeType::Other(_)
        )
    }
}

/// Decimals wider than [`MAX_DECIMAL_DIGITS`] travel as text and are
/// validated by the server.
fn decimal(type_name: &str, precision: u32, scale: u32) -> NativeType {
    if precision <= MAX_DECIMAL_DIGITS && scale <= MAX_DECIMAL_DIGITS {
        NativeType::Decimal { precision, scale }
    } else {
        NativeType::Other(type_name.to_string())
    }
}

/// Return the argument list of `name(...)`, if `s` has that shape.
fn unwrap_call<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(NativeType::parse("Int32"), NativeType::Int { bits: 32 });
        assert_eq!(NativeType::parse("Int64"), NativeType::Int { bits: 64 });
        assert_eq!(NativeType::parse("UInt8"), NativeType::UInt { bits: 8 });
        assert_eq!(NativeType::parse("UInt64"), NativeType::UInt { bits: 64 });
    }

    #[test]
    fn test_wide_integers_fall_back_to_text() {
        assert_eq!(
            NativeType::parse("Int128"),
            NativeType::Other("Int128".to_string())
        );
        assert!(NativeType::parse("UInt256").is_textual());
    }

    #[test]
    fn test_nullable_and_low_cardinality() {
        let t = NativeType::parse("Nullable(Float64)");
        assert!(t.is_nullable());
        assert_eq!(t.base(), &NativeType::Float { bits: 64 });

        assert_eq!(NativeType::parse("LowCardinality(String)"), NativeType::String);

        let t = NativeType::parse("LowCardinality(Nullable(String))");
        assert!(t.is_nullable());
        assert!(t.is_textual());
    }

    #[test]
    fn test_decimal_types() {
        assert_eq!(
            NativeType::parse("Decimal(18, 4)"),
            NativeType::Decimal { precision: 18, scale: 4 }
        );
        assert_eq!(
            NativeType::parse("Decimal64(2)"),
            NativeType::Decimal { precision: 18, scale: 2 }
        );
        assert_eq!(
            NativeType::parse("Decimal(28, 28)"),
            NativeType::Decimal { precision: 28, scale: 28 }
        );
    }

    #[test]
    fn test_wide_decimals_fall_back_to_text() {
        assert_eq!(
            NativeType::parse("Decimal(38, 2)"),
            NativeType::Other("Decimal(38, 2)".to_string())
        );
        assert!(NativeType::parse("Decimal128(4)").is_textual());
        assert!(NativeType::parse("Decimal256(10)").is_textual());
        let t = NativeType::parse("Nullable(Decimal(38, 30))");
        assert!(t.is_nullable());
        assert!(t.is_textual());
    }

    #[test]
    fn test_datetime_types() {
        assert_eq!(NativeType::parse("Date"), NativeType::Date);
        assert_eq!(NativeType::parse("Date32"), NativeType::Date);
        assert_eq!(
            NativeType::parse("DateTime"),
            NativeType::DateTime { precision: 0 }
        );
        assert_eq!(
            NativeType::parse("DateTime('UTC')"),
            NativeType::DateTime { precision: 0 }
        );
        assert_eq!(
            NativeType::parse("DateTime64(6, 'Europe/Berlin')"),
            NativeType::DateTime { precision: 6 }
        );
    }

    #[test]
    fn test_special_types() {
        assert_eq!(NativeType::parse("UUID"), NativeType::Uuid);
        assert_eq!(NativeType::parse("Bool"), NativeType::Bool);
        assert_eq!(NativeType::parse("FixedString(16)"), NativeType::FixedString(16));
        assert_eq!(NativeType::parse("Enum8('a' = 1, 'b' = 2)"), NativeType::Enum);
        assert!(NativeType::parse("Array(String)").is_textual());
    }

    #[test]
    fn test_fallback_text_type_is_nullable_text() {
        let t = NativeType::parse(FALLBACK_TEXT_TYPE);
        assert!(t.is_nullable());
        assert_eq!(t.base(), &NativeType::String);
    }
}
