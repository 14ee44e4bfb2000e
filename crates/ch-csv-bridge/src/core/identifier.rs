//! Identifier validation and quoting.
//!
//! Table and column names arrive from callers and from file headers, and
//! identifiers cannot be bound as query parameters. Every identifier placed
//! into a statement goes through [`quote_ident`], which validates it and
//! applies ClickHouse backtick quoting with backslash escapes.

use crate::error::{BridgeError, Result};

/// Maximum identifier length accepted by the bridge.
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `BridgeError::InvalidSelection` naming the identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::invalid_selection(
            name,
            "identifier cannot be empty",
        ));
    }

    if name.contains('\0') {
        return Err(BridgeError::invalid_selection(
            name.replace('\0', "\\0"),
            "identifier contains a null byte",
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BridgeError::invalid_selection(
            name,
            format!(
                "identifier exceeds maximum length of {} bytes (got {} bytes)",
                MAX_IDENTIFIER_LENGTH,
                name.len()
            ),
        ));
    }

    Ok(())
}

/// Quote a ClickHouse identifier using backticks.
///
/// Escapes backslashes and backticks with a backslash.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_ident("users")?, "`users`");
/// assert_eq!(quote_ident("table`name")?, "`table\\`name`");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!(
        "`{}`",
        name.replace('\\', "\\\\").replace('`', "\\`")
    ))
}

/// Quote and join a list of column names.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
