use super::schema::{Config, ROW_PLACEHOLDER};

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let sheet = &config.sheet;
    if sheet.spreadsheet_id.trim().is_empty() {
        errors.push("sheet.spreadsheet_id: must not be empty".to_string());
    }
    if sheet.tab.trim().is_empty() {
        errors.push("sheet.tab: must not be empty".to_string());
    }
    if sheet.credentials_path.as_os_str().is_empty() {
        errors.push("sheet.credentials_path: must not be empty".to_string());
    }
    if sheet.start_row < 1 {
        errors.push("sheet.start_row: must be at least 1".to_string());
    }
    if sheet.start_col < 1 {
        errors.push("sheet.start_col: must be at least 1".to_string());
    }

    if config.website.url.trim().is_empty() {
        errors.push("website.url: must not be empty".to_string());
    } else if let Err(e) = url::Url::parse(&config.website.url) {
        errors.push(format!("website.url: invalid '{}' - {}", config.website.url, e));
    }
    if let Err(e) = url::Url::parse(&config.website.webdriver_url) {
        errors.push(format!(
            "website.webdriver_url: invalid '{}' - {}",
            config.website.webdriver_url, e
        ));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("grid", &timeouts.grid),
        ("row", &timeouts.row),
        ("inputs", &timeouts.inputs),
        ("poll", &timeouts.poll),
    ] {
        match humantime::parse_duration(value) {
            Ok(d) if d.is_zero() => {
                errors.push(format!("timeouts.{}: must be greater than zero", name));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("timeouts.{}: invalid '{}' - {}", name, value, e)),
        }
    }

    let selectors = &config.selectors;
    if selectors.landmark.trim().is_empty() {
        errors.push("selectors.landmark: must not be empty".to_string());
    }
    if !selectors.row.contains(ROW_PLACEHOLDER) {
        errors.push(format!(
            "selectors.row: must contain the {} placeholder",
            ROW_PLACEHOLDER
        ));
    }
    if selectors.inputs.trim().is_empty() {
        errors.push("selectors.inputs: must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
