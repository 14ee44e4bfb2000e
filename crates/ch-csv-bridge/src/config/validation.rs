//! Configuration validation.

use super::Config;
use crate::error::{BridgeError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;
    if conn.host.is_empty() {
        return Err(BridgeError::Config("connection.host is required".into()));
    }
    if conn.port == 0 {
        return Err(BridgeError::Config(
            "connection.port must be non-zero".into(),
        ));
    }
    if conn.database.is_empty() {
        return Err(BridgeError::Config(
            "connection.database is required".into(),
        ));
    }
    if conn.user.is_empty() {
        return Err(BridgeError::Config("connection.user is required".into()));
    }
    if conn.password.is_some() && conn.jwt_token.is_some() {
        return Err(BridgeError::Config(
            "connection.password and connection.jwt_token are mutually exclusive".into(),
        ));
    }

    let transfer = &config.transfer;
    if transfer.batch_size == 0 {
        return Err(BridgeError::Config(
            "transfer.batch_size must be at least 1".into(),
        ));
    }
    if !(transfer.max_error_fraction > 0.0 && transfer.max_error_fraction <= 1.0) {
        return Err(BridgeError::Config(format!(
            "transfer.max_error_fraction must be in (0, 1], got {}",
            transfer.max_error_fraction
        )));
    }
    if transfer.read_ahead == 0 {
        return Err(BridgeError::Config(
            "transfer.read_ahead must be at least 1".into(),
        ));
    }
    if transfer.connect_timeout_secs == 0 {
        return Err(BridgeError::Config(
            "transfer.connect_timeout_secs must be at least 1".into(),
        ));
    }
    if transfer.null_marker.is_empty() {
        return Err(BridgeError::Config(
            "transfer.null_marker cannot be empty (it must differ from an empty string)".into(),
        ));
    }

    Ok(())
}
