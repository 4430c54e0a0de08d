//! Data fetcher: reads the score block out of a Google Sheet.

pub mod client;
pub mod credentials;
mod slice;

pub use client::SheetsClient;
pub use credentials::ServiceAccount;

use slice::slice_scores;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::SheetConfig;

/// Rows of cell values, in sheet order. Rows map to grid rows by position.
pub type ScoreMatrix = Vec<Vec<String>>;

/// Authenticate and read the whole configured tab.
pub async fn fetch_raw_values(config: &SheetConfig) -> Result<Vec<Vec<String>>> {
    let account = ServiceAccount::from_file(&config.credentials_path)?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("score-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let token = account.fetch_access_token(&http).await?;
    tracing::debug!(
        account = %account.client_email,
        expires_in = token.expires_in,
        "Obtained access token"
    );

    let client = SheetsClient::new(http, token.access_token)?;
    client.get_values(&config.spreadsheet_id, &config.tab).await
}

/// Fetch the score matrix, or `None` if there is nothing to fill.
///
/// Every failure (credentials, network, malformed response) is logged and
/// turned into `None` so the caller can stop before opening a browser.
pub async fn fetch_score_matrix(config: &SheetConfig) -> Option<ScoreMatrix> {
    info!(
        spreadsheet = %config.spreadsheet_id,
        tab = %config.tab,
        "Connecting to Google Sheets"
    );

    let raw = match fetch_raw_values(config).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to fetch data from Google Sheets: {:#}", e);
            return None;
        }
    };

    match slice_scores(raw, config.start_row, config.start_col) {
        Some(matrix) => {
            info!("Fetched {} rows of score data", matrix.len());
            Some(matrix)
        }
        None => {
            warn!(
                "No data found in the sheet, or start row {} is past the last row",
                config.start_row
            );
            None
        }
    }
}
