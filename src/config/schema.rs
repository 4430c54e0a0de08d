use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_LANDMARK_XPATH: &str =
    "/html/body/div[2]/div[3]/div/div[2]/div[3]/table/thead/tr/th[1]/div";
pub const DEFAULT_ROW_XPATH: &str = "//table/tbody/tr[{row}]";
pub const DEFAULT_INPUTS_XPATH: &str = ".//td/input";

/// Placeholder in the row selector replaced by the 1-based row position.
pub const ROW_PLACEHOLDER: &str = "{row}";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sheet: SheetConfig,
    pub website: WebsiteConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Where the scores live in the spreadsheet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub tab: String,
    /// Path to the service account JSON key.
    pub credentials_path: PathBuf,
    /// First row holding scores, 1-based.
    pub start_row: usize,
    /// First column holding scores, 1-based ('A' is 1).
    pub start_col: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebsiteConfig {
    pub url: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub browser: Browser,
    #[serde(default)]
    pub headless: bool,
}

fn default_webdriver_url() -> String {
    DEFAULT_WEBDRIVER_URL.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

/// Bounded wait durations, as humantime strings ("30s", "250ms").
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub grid: String,
    pub row: String,
    pub inputs: String,
    pub poll: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            grid: "30s".to_string(),
            row: "30s".to_string(),
            inputs: "10s".to_string(),
            poll: "250ms".to_string(),
        }
    }
}

/// Parsed form of [`TimeoutConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub grid: Duration,
    pub row: Duration,
    pub inputs: Duration,
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            grid: Duration::from_secs(30),
            row: Duration::from_secs(30),
            inputs: Duration::from_secs(10),
            poll: Duration::from_millis(250),
        }
    }
}

impl TimeoutConfig {
    /// Parse every duration. Validation has already rejected bad values
    /// when this is called from the binary, but the error is kept.
    pub fn resolve(&self) -> Result<Timeouts, humantime::DurationError> {
        Ok(Timeouts {
            grid: humantime::parse_duration(&self.grid)?,
            row: humantime::parse_duration(&self.row)?,
            inputs: humantime::parse_duration(&self.inputs)?,
            poll: humantime::parse_duration(&self.poll)?,
        })
    }
}

/// XPath selectors used to address the grid by position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub landmark: String,
    /// Row template; `{row}` becomes the 1-based row position.
    pub row: String,
    /// Evaluated relative to a located row.
    pub inputs: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            landmark: DEFAULT_LANDMARK_XPATH.to_string(),
            row: DEFAULT_ROW_XPATH.to_string(),
            inputs: DEFAULT_INPUTS_XPATH.to_string(),
        }
    }
}

impl SelectorConfig {
    pub fn row_xpath(&self, position: usize) -> String {
        self.row.replace(ROW_PLACEHOLDER, &position.to_string())
    }
}
