use anyhow::{Context, Result};
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};

use super::{CellEvent, GridPage};
use crate::config::{Browser, SelectorConfig, WebsiteConfig};

const SCROLL_INTO_VIEW_JS: &str = "arguments[0].scrollIntoView({block: 'center'});";
const SET_VALUE_JS: &str = "arguments[0].value = arguments[1];";
const DISPATCH_EVENT_JS: &str =
    "arguments[0].dispatchEvent(new Event(arguments[1], { bubbles: true }));";

/// WebDriver capabilities for the configured browser.
pub fn capabilities(browser: Browser, headless: bool) -> Map<String, Value> {
    let mut caps = Map::new();
    match browser {
        Browser::Chrome => {
            caps.insert("browserName".to_string(), json!("chrome"));
            if headless {
                caps.insert(
                    "goog:chromeOptions".to_string(),
                    json!({ "args": ["--headless=new"] }),
                );
            }
        }
        Browser::Firefox => {
            caps.insert("browserName".to_string(), json!("firefox"));
            if headless {
                caps.insert(
                    "moz:firefoxOptions".to_string(),
                    json!({ "args": ["-headless"] }),
                );
            }
        }
    }
    caps
}

/// A live browser session on the grid page, driven over WebDriver.
pub struct WebDriverPage {
    client: Client,
    selectors: SelectorConfig,
}

impl WebDriverPage {
    /// Start a new session on the WebDriver server named in `website`.
    pub async fn connect(website: &WebsiteConfig, selectors: SelectorConfig) -> Result<Self> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(website.browser, website.headless));
        let client = builder.connect(&website.webdriver_url).await.with_context(|| {
            format!(
                "Failed to start a browser session at {}. Is the WebDriver server running?",
                website.webdriver_url
            )
        })?;
        Ok(Self { client, selectors })
    }

    async fn run_script(&self, script: &str, args: Vec<Value>) -> Result<()> {
        self.client
            .execute(script, args)
            .await
            .context("Script execution failed")?;
        Ok(())
    }
}

fn element_arg(element: &Element) -> Result<Value> {
    serde_json::to_value(element).context("Failed to serialize element reference")
}

impl GridPage for WebDriverPage {
    type Row = Element;
    type Cell = Element;

    async fn open(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to open {}", url))
    }

    async fn landmark_visible(&self) -> Result<bool> {
        let found = self
            .client
            .find_all(Locator::XPath(&self.selectors.landmark))
            .await
            .context("Landmark lookup failed")?;
        for element in found {
            // Stale between lookup and check counts as not visible yet.
            if element.is_displayed().await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn find_row(&self, position: usize) -> Result<Option<Element>> {
        let xpath = self.selectors.row_xpath(position);
        let rows = self
            .client
            .find_all(Locator::XPath(&xpath))
            .await
            .with_context(|| format!("Row lookup failed for {}", xpath))?;
        Ok(rows.into_iter().next())
    }

    async fn scroll_into_view(&self, row: &Element) -> Result<()> {
        self.run_script(SCROLL_INTO_VIEW_JS, vec![element_arg(row)?])
            .await
    }

    async fn row_inputs(&self, row: &Element) -> Result<Vec<Element>> {
        row.find_all(Locator::XPath(&self.selectors.inputs))
            .await
            .context("Input lookup failed")
    }

    async fn set_value(&self, cell: &Element, value: &str) -> Result<()> {
        self.run_script(SET_VALUE_JS, vec![element_arg(cell)?, json!(value)])
            .await
    }

    async fn dispatch(&self, cell: &Element, event: CellEvent) -> Result<()> {
        self.run_script(DISPATCH_EVENT_JS, vec![element_arg(cell)?, json!(event.name())])
            .await
    }

    async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("Failed to end browser session")
    }
}
