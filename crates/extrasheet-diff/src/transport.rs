//! HTTP boundary for `spreadsheets.batchUpdate`.

use std::fmt;
use std::time::Duration;

use serde_json::Value as JsonValue;

pub const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Sends one `batchUpdate` body and returns the response body.
pub trait BatchUpdateTransport {
    fn batch_update(
        &self,
        spreadsheet_id: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, TransportError>;
}

impl<T: BatchUpdateTransport + ?Sized> BatchUpdateTransport for &T {
    fn batch_update(
        &self,
        spreadsheet_id: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, TransportError> {
        (**self).batch_update(spreadsheet_id, body)
    }
}

#[derive(Clone)]
pub struct PushConfig {
    /// OAuth bearer token.
    pub token: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl PushConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushConfig")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Blocking `reqwest` transport against the Sheets v4 REST API.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: PushConfig,
}

impl HttpTransport {
    pub fn new(config: PushConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("building HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, spreadsheet_id: &str) -> String {
        batch_update_url(&self.config.endpoint, spreadsheet_id)
    }
}

fn batch_update_url(endpoint: &str, spreadsheet_id: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{spreadsheet_id}:batchUpdate",
        endpoint.trim_end_matches('/')
    )
}

impl BatchUpdateTransport for HttpTransport {
    fn batch_update(
        &self,
        spreadsheet_id: &str,
        body: &JsonValue,
    ) -> Result<JsonValue, TransportError> {
        let url = self.url(spreadsheet_id);
        log::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.config.timeout)
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| TransportError::Other(format!("reading response body: {e}")))?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Other(format!("invalid response body: {e}")))
    }
}
