use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::config::{
    get_config_path, validate_config, Browser, Config, SelectorConfig, SheetConfig, TimeoutConfig,
    WebsiteConfig, DEFAULT_WEBDRIVER_URL,
};

/// Prompt user with a message and return their trimmed input.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

/// Prompt user with a message and a default value. Returns default if input is empty.
fn prompt_with_default(message: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}]: ", message, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

/// Prompt until the user enters something non-empty.
fn prompt_required(message: &str) -> Result<String> {
    loop {
        let input = prompt(&format!("{}: ", message))?;
        if !input.is_empty() {
            return Ok(input);
        }
        println!("  A value is required.");
    }
}

/// Prompt user with a yes/no question. Returns bool based on input and default.
fn prompt_yes_no(message: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    let input = prompt(&format!("{} [{}]: ", message, hint))?;
    Ok(parse_yes_no(&input, default_yes))
}

fn parse_yes_no(input: &str, default_yes: bool) -> bool {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        default_yes
    } else {
        input == "y" || input == "yes"
    }
}

/// Prompt for a 1-based spreadsheet position.
fn prompt_position(message: &str, default: usize) -> Result<usize> {
    loop {
        let input = prompt_with_default(message, &default.to_string())?;
        match parse_position(&input) {
            Some(v) => return Ok(v),
            None => println!("  Invalid: must be a whole number of at least 1. Try again."),
        }
    }
}

/// Accepts a number ("2") or a column letter ("B", "AA").
fn parse_position(input: &str) -> Option<usize> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return (n >= 1).then_some(n);
    }
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    input
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
        })
}

/// Write the config as YAML, atomically.
fn write_config(path: &Path, config: &Config) -> Result<()> {
    let yaml = serde_saphyr::to_string(config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    file.write_all(yaml.as_bytes())
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    file.commit()
        .with_context(|| format!("Failed to save config to {}", path.display()))?;

    Ok(())
}

/// Run the interactive init wizard to create a config file.
///
/// If `default_path` is Some, uses that as the config file path.
/// Otherwise, prompts the user with the default config path.
pub fn run_init_wizard(default_path: Option<PathBuf>) -> Result<()> {
    println!();
    println!("score-sync configuration");
    println!("========================");
    println!();

    // 1. Spreadsheet
    println!("The spreadsheet ID is in its URL: https://docs.google.com/spreadsheets/d/<ID>/edit");
    let spreadsheet_id = prompt_required("Spreadsheet ID")?;
    let tab = prompt_with_default("Tab name", "Sheet1")?;
    println!();
    println!("A Google service account key (JSON) with Viewer access to the sheet is required.");
    let credentials_path = PathBuf::from(prompt_required("Path to service account key")?);
    println!();
    println!("Where do the scores start? Rows are 1-based, columns accept a number or a letter ('B' is 2).");
    let start_row = prompt_position("First score row", 2)?;
    let start_col = prompt_position("First score column", 2)?;

    // 2. Website
    println!();
    let url = prompt_required("URL of the page holding the grid")?;
    let webdriver_url = prompt_with_default("WebDriver server URL", DEFAULT_WEBDRIVER_URL)?;
    let browser = loop {
        let input = prompt_with_default("Browser (chrome/firefox)", "chrome")?;
        match input.to_lowercase().as_str() {
            "chrome" => break Browser::Chrome,
            "firefox" => break Browser::Firefox,
            _ => println!("  Invalid: expected 'chrome' or 'firefox'. Try again."),
        }
    };

    let config = Config {
        sheet: SheetConfig {
            spreadsheet_id,
            tab,
            credentials_path,
            start_row,
            start_col,
        },
        website: WebsiteConfig {
            url,
            webdriver_url,
            browser,
            headless: false,
        },
        timeouts: TimeoutConfig::default(),
        selectors: SelectorConfig::default(),
    };

    if let Err(errors) = validate_config(&config) {
        println!();
        println!("The configuration is not valid:");
        for error in &errors {
            println!("  - {}", error);
        }
        anyhow::bail!("Aborted: {} invalid field(s)", errors.len());
    }

    // 3. Config path
    let default_config_path = default_path.unwrap_or_else(get_config_path);
    println!();
    let path_str = prompt_with_default(
        "Where should the config be saved?",
        &default_config_path.display().to_string(),
    )?;
    let config_path = PathBuf::from(&path_str);

    if config_path.exists() {
        let overwrite = prompt_yes_no(
            &format!(
                "Config already exists at {}. Overwrite?",
                config_path.display()
            ),
            false,
        )?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    write_config(&config_path, &config)?;

    println!();
    println!("Config written to {}", config_path.display());
    println!("Timeouts and selectors use defaults; edit the file to change them.");
    println!("Start a WebDriver server, then run `score-sync` to get started.");

    Ok(())
}
