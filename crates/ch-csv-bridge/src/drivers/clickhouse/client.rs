//! HTTP transport for the ClickHouse driver.
//!
//! Every call is a POST to the server root with the session database and
//! output settings as URL parameters. Failures are classified from the HTTP
//! status and the `X-ClickHouse-Exception-Code` header.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{ConnectionSpec, Credential};
use crate::error::{BridgeError, Result};

const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Output settings applied to every request. Quoting keeps 64-bit integers
/// and decimals exact and keeps nan/inf representable in JSON.
const OUTPUT_SETTINGS: &[(&str, &str)] = &[
    ("output_format_json_quote_64bit_integers", "1"),
    ("output_format_json_quote_decimals", "1"),
    ("output_format_json_quote_denormals", "1"),
];

// Server exception codes (ErrorCodes.cpp).
const UNKNOWN_TABLE: u32 = 60;
const UNKNOWN_DATABASE: u32 = 81;
const UNKNOWN_USER: u32 = 192;
const WRONG_PASSWORD: u32 = 193;
const REQUIRED_PASSWORD: u32 = 194;
const AUTHENTICATION_FAILED: u32 = 516;

/// HTTP client bound to one endpoint and one credential.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    spec: ConnectionSpec,
    base_url: String,
    cancel: CancellationToken,
}

impl HttpClient {
    pub fn new(spec: &ConnectionSpec, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BridgeError::Connection(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: spec.base_url(),
            spec: spec.clone(),
            cancel: CancellationToken::new(),
        })
    }

    /// Run a statement and discard its output.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let resp = self.send(self.request(None).body(sql.to_string()), None).await?;
        self.read_text(resp).await?;
        Ok(())
    }

    /// Run a query and collect its non-empty output lines.
    pub async fn fetch_lines(&self, sql: &str, table: Option<&str>) -> Result<Vec<String>> {
        let resp = self.send(self.request(None).body(sql.to_string()), table).await?;
        let text = self.read_text(resp).await?;
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Run a query and hand back the response for incremental reading.
    pub async fn stream(&self, sql: &str, table: &str) -> Result<Response> {
        self.send(self.request(None).body(sql.to_string()), Some(table))
            .await
    }

    /// Send `body` as the data of an `INSERT ... FORMAT` statement.
    pub async fn insert(&self, statement: &str, body: String, table: &str) -> Result<()> {
        let resp = self
            .send(self.request(Some(statement)).body(body), Some(table))
            .await?;
        self.read_text(resp).await?;
        Ok(())
    }

    /// Cancel in-flight calls and refuse new ones.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn closed_error() -> BridgeError {
        BridgeError::Connection("connection closed".into())
    }

    fn request(&self, statement: Option<&str>) -> RequestBuilder {
        let mut req = self
            .http
            .post(&self.base_url)
            .query(&[("database", self.spec.database.as_str())])
            .query(OUTPUT_SETTINGS);
        if let Some(statement) = statement {
            req = req.query(&[("query", statement)]);
        }
        match self.spec.credential() {
            Credential::Bearer(token) => req.bearer_auth(token),
            Credential::Password(password) => req
                .header("X-ClickHouse-User", &self.spec.user)
                .header("X-ClickHouse-Key", password),
            Credential::None => req.header("X-ClickHouse-User", &self.spec.user),
        }
    }

    async fn send(&self, req: RequestBuilder, table: Option<&str>) -> Result<Response> {
        if self.cancel.is_cancelled() {
            return Err(Self::closed_error());
        }
        let resp = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Self::closed_error()),
            r = req.send() => r.map_err(|e| self.transport_error(e))?,
        };

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = resp
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok());
        let message = resp.text().await.unwrap_or_default();
        debug!("ClickHouse request failed: status={}, code={:?}", status, code);
        Err(classify_failure(
            status,
            code,
            message.trim(),
            &self.spec.database,
            table,
        ))
    }

    async fn read_text(&self, resp: Response) -> Result<String> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Self::closed_error()),
            r = resp.text() => r.map_err(|e| self.transport_error(e)),
        }
    }

    pub(crate) fn transport_error(&self, e: reqwest::Error) -> BridgeError {
        if e.is_connect() || e.is_timeout() {
            BridgeError::Connection(format!(
                "cannot reach {}:{}: {}",
                self.spec.host, self.spec.port, e
            ))
        } else {
            BridgeError::store(None, e.to_string())
        }
    }
}

/// Map a failed HTTP exchange to an error category.
pub(crate) fn classify_failure(
    status: StatusCode,
    code: Option<u32>,
    message: &str,
    database: &str,
    table: Option<&str>,
) -> BridgeError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return BridgeError::Connection(format!("authentication rejected: {}", message));
    }
    match code {
        Some(UNKNOWN_USER | WRONG_PASSWORD | REQUIRED_PASSWORD | AUTHENTICATION_FAILED) => {
            BridgeError::Connection(format!("authentication rejected: {}", message))
        }
        Some(UNKNOWN_TABLE) => BridgeError::table_not_found(table.unwrap_or(message)),
        Some(UNKNOWN_DATABASE) => BridgeError::NotFound {
            kind: "Database",
            name: database.to_string(),
        },
        _ => BridgeError::store(code, message),
    }
}

/// Servers that fail after the response header was sent append the
/// exception text to the body instead of a data line.
pub(crate) fn mid_stream_exception(line: &str) -> Option<BridgeError> {
    let rest = line.trim_start().strip_prefix("Code: ")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some(BridgeError::store(digits.parse().ok(), line.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_status_is_connection_error() {
        let err = classify_failure(StatusCode::UNAUTHORIZED, None, "nope", "default", None);
        assert!(matches!(err, BridgeError::Connection(_)));

        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(AUTHENTICATION_FAILED),
            "bad password",
            "default",
            None,
        );
        assert!(matches!(err, BridgeError::Connection(_)));
    }

    #[test]
    fn test_unknown_table_is_not_found() {
        let err = classify_failure(
            StatusCode::NOT_FOUND,
            Some(UNKNOWN_TABLE),
            "Table default.t does not exist",
            "default",
            Some("t"),
        );
        match err {
            BridgeError::NotFound { kind, name } => {
                assert_eq!(kind, "Table");
                assert_eq!(name, "t");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_database_is_not_found() {
        let err = classify_failure(
            StatusCode::NOT_FOUND,
            Some(UNKNOWN_DATABASE),
            "Database x does not exist",
            "x",
            None,
        );
        assert!(matches!(err, BridgeError::NotFound { kind: "Database", .. }));
    }

    #[test]
    fn test_other_codes_are_store_errors() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            Some(62),
            "Syntax error",
            "default",
            None,
        );
        assert!(matches!(err, BridgeError::Store { code: Some(62), .. }));
    }

    #[test]
    fn test_mid_stream_exception() {
        let err = mid_stream_exception("Code: 241. DB::Exception: Memory limit exceeded").unwrap();
        assert!(matches!(err, BridgeError::Store { code: Some(241), .. }));
        assert!(mid_stream_exception(r#"["1","a"]"#).is_none());
    }

    #[test]
    fn test_close_refuses_new_requests() {
        let spec = ConnectionSpec::new("localhost", 8123, "default", "default");
        let client = HttpClient::new(&spec, Duration::from_secs(1)).unwrap();
        client.close();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt.block_on(client.execute("SELECT 1")).unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
    }
}
