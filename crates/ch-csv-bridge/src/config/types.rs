//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store endpoint (ClickHouse).
    pub connection: ConnectionSpec,

    /// Transfer behavior configuration.
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Identifies one store endpoint.
///
/// Owned by the request that created it and never persisted by the library.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Store host.
    pub host: String,

    /// HTTP interface port (default: 8123).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name (default: "default").
    #[serde(default = "default_database")]
    pub database: String,

    /// Username (default: "default").
    #[serde(default = "default_user")]
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// JWT bearer token, used instead of a password. Never serialized.
    #[serde(default, skip_serializing)]
    pub jwt_token: Option<String>,

    /// Use https (default: false).
    #[serde(default)]
    pub secure: bool,
}

/// How a connection authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    None,
    Password(&'a str),
    Bearer(&'a str),
}

impl ConnectionSpec {
    /// Create a spec without a credential over plain http.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: None,
            jwt_token: None,
            secure: false,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.jwt_token = None;
        self
    }

    pub fn with_jwt_token(mut self, token: impl Into<String>) -> Self {
        self.jwt_token = Some(token.into());
        self.password = None;
        self
    }

    pub fn credential(&self) -> Credential<'_> {
        match (&self.password, &self.jwt_token) {
            (_, Some(token)) => Credential::Bearer(token),
            (Some(password), None) => Credential::Password(password),
            (None, None) => Credential::None,
        }
    }

    /// Base URL of the HTTP interface.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

// Custom Debug to keep credentials out of logs.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("jwt_token", &redact(&self.jwt_token))
            .field("secure", &self.secure)
            .finish()
    }
}

/// Transfer behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Rows per batch, in both directions (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fraction of failed rows in a single import batch at which the
    /// transfer aborts (default: 0.2).
    #[serde(default = "default_max_error_fraction")]
    pub max_error_fraction: f64,

    /// Text written for NULL cells and read back as NULL (default: `\N`).
    #[serde(default = "default_null_marker")]
    pub null_marker: String,

    /// Maximum rows returned by a preview (default: 100).
    #[serde(default = "default_preview_limit")]
    pub preview_limit: u64,

    /// Batches buffered between the reading and writing stage (default: 2).
    #[serde(default = "default_read_ahead")]
    pub read_ahead: usize,

    /// Create the destination table on import when absent (default: true).
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// Directory for exports without an explicit destination (default: ".").
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// TCP connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_error_fraction: default_max_error_fraction(),
            null_marker: default_null_marker(),
            preview_limit: default_preview_limit(),
            read_ahead: default_read_ahead(),
            create_if_missing: true,
            output_dir: default_output_dir(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl TransferConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Destination used when an export names no path: `<output_dir>/<table>_export.csv`.
    pub fn default_export_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}_export.csv", table))
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    8123
}

fn default_database() -> String {
    "default".to_string()
}

fn default_user() -> String {
    "default".to_string()
}

fn default_batch_size() -> usize {
    1_000
}

fn default_max_error_fraction() -> f64 {
    0.2
}

fn default_null_marker() -> String {
    "\\N".to_string()
}

fn default_preview_limit() -> u64 {
    100
}

fn default_read_ahead() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_connect_timeout_secs() -> u64 {
    10
}
