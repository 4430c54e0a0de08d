use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use url::Url;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Response body of `spreadsheets.values.get`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    range: Option<String>,
    /// Absent when the range is empty.
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Read-only client for the values endpoint of the Sheets API.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    access_token: String,
    base_url: Url,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, access_token: String) -> Result<Self> {
        let base_url = Url::parse(SHEETS_API_BASE).context("Failed to parse Sheets API url")?;
        Ok(Self {
            http,
            access_token,
            base_url,
        })
    }

    /// `{base}/{spreadsheet_id}/values/{range}`, each part encoded as one
    /// path segment, asking for displayed values rather than formulas.
    pub fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API url cannot be a base"))?
            .push(spreadsheet_id)
            .push("values")
            .push(range);
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");
        Ok(url)
    }

    /// Fetch every value of `range` (a tab name selects the whole tab).
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, range)?;

        // Retry strategy: exponential backoff with 3 attempts
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(std::time::Duration::from_secs(5))
            .take(3);

        let http = &self.http;
        let token = self.access_token.as_str();
        let url = &url;

        let fetch = || async move {
            let response = http
                .get(url.clone())
                .bearer_auth(token)
                .send()
                .await
                .context("Failed to reach the Sheets API")?;

            let status = response.status();
            if !status.is_success() {
                return Err(anyhow::Error::from(describe_status(status, spreadsheet_id, range)));
            }

            response
                .json::<ValueRange>()
                .await
                .context("Failed to parse Sheets API response")
        };
        let body: ValueRange = RetryIf::spawn(retry_strategy, fetch, is_retryable).await?;

        tracing::debug!(
            range = body.range.as_deref().unwrap_or(range),
            rows = body.values.len(),
            "Fetched sheet values"
        );

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// A non-success response from the Sheets API.
#[derive(Debug)]
pub struct StatusError {
    pub status: StatusCode,
    message: String,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StatusError {}

impl StatusError {
    /// Rate limiting and server errors may succeed on a later attempt;
    /// other statuses will not.
    pub fn is_transient(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }
}

/// Network and decoding failures are retried; client errors are not.
fn is_retryable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<StatusError>()
        .map_or(true, StatusError::is_transient)
}

fn describe_status(status: StatusCode, spreadsheet_id: &str, range: &str) -> StatusError {
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!(
            "Access denied ({}). Share the spreadsheet with the service account (Viewer is enough).",
            status
        ),
        StatusCode::NOT_FOUND => format!(
            "Spreadsheet '{}' not found ({}). Check the spreadsheet ID.",
            spreadsheet_id, status
        ),
        StatusCode::BAD_REQUEST => format!(
            "Sheets API rejected range '{}' ({}). Check the tab name.",
            range, status
        ),
        StatusCode::TOO_MANY_REQUESTS => {
            "Sheets API rate limit exceeded. Wait a minute and try again.".to_string()
        }
        _ => format!("Sheets API error: {}", status),
    };
    StatusError { status, message }
}

/// Formatted values arrive as strings; anything else is rendered as text.
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
