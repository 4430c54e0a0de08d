use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use score_sync::checkpoint::ConsoleCheckpoint;
use score_sync::config::{self, Config};
use score_sync::grid::{self, FillError, WebDriverPage};
use score_sync::output;
use score_sync::sheets;
use score_sync::ScoreMatrix;

const EXIT_SUCCESS: i32 = 0;
const EXIT_NO_DATA: i32 = 1;
const EXIT_BROWSER: i32 = 2;
const EXIT_GRID_NOT_FOUND: i32 = 3;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch scores and type them into the grid (default if no subcommand)
    Run,
    /// Fetch scores and print them without opening a browser
    Fetch {
        /// Print tab-separated values instead of a table
        #[arg(long)]
        tsv: bool,
    },
    /// Create a config file interactively
    Init,
}

#[derive(Parser, Debug)]
#[command(name = "score-sync")]
#[command(about = "Copy score rows from a Google Sheet into a web data grid", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/score-sync/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "score_sync=debug"
    } else {
        "score_sync=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

/// Load and validate the config, exiting with EXIT_CONFIG on any problem.
fn load_config_or_exit(path: Option<PathBuf>) -> Config {
    let config = match config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    config
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("A rustls crypto provider was already installed");
    }

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);
    let config_path = cli.config.map(PathBuf::from);

    match command {
        Commands::Init => {
            if let Err(e) = config::init::run_init_wizard(config_path) {
                eprintln!("Error: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        }
        Commands::Fetch { tsv } => {
            init_logging(cli.verbose);
            let config = load_config_or_exit(config_path);
            let matrix = fetch_or_exit(&config).await;

            if tsv {
                println!("{}", output::format_tsv(&matrix));
            } else {
                println!(
                    "{}",
                    output::format_matrix(&matrix, output::should_use_colors())
                );
            }
        }
        Commands::Run => {
            init_logging(cli.verbose);
            let config = load_config_or_exit(config_path);
            run_fill(&config).await;
        }
    }

    std::process::exit(EXIT_SUCCESS);
}

/// Fetch the score matrix, exiting with EXIT_NO_DATA when there is none.
async fn fetch_or_exit(config: &Config) -> ScoreMatrix {
    match sheets::fetch_score_matrix(&config.sheet).await {
        Some(matrix) => matrix,
        None => {
            eprintln!("No score data to enter. Exiting.");
            std::process::exit(EXIT_NO_DATA);
        }
    }
}

async fn run_fill(config: &Config) {
    let timeouts = match config.timeouts.resolve() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Config error: invalid timeout - {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Nothing to do without data, so the browser is never opened.
    let matrix = fetch_or_exit(config).await;

    let page = match WebDriverPage::connect(&config.website, config.selectors.clone()).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Browser error: {:#}", e);
            std::process::exit(EXIT_BROWSER);
        }
    };

    let checkpoint = ConsoleCheckpoint::new(output::should_use_colors());
    match grid::fill_grid(page, &config.website.url, &matrix, &timeouts, &checkpoint).await {
        Ok(report) => {
            if !report.is_clean() {
                eprintln!("Some rows or cells were not entered; check them by hand before saving.");
            }
        }
        Err(e @ FillError::GridNotFound { .. }) => {
            eprintln!("Error while {}: {}", e.phase(), e);
            std::process::exit(EXIT_GRID_NOT_FOUND);
        }
        Err(e) => {
            eprintln!("Error while {}: {}", e.phase(), e);
            std::process::exit(EXIT_BROWSER);
        }
    }
}
