use anyhow::{Context, Result};
use std::io::{BufRead, Write};

use super::Checkpoint;
use crate::grid::FillReport;
use crate::output;

/// Blocks on Enter in the terminal at each checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleCheckpoint {
    pub use_colors: bool,
}

impl ConsoleCheckpoint {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }
}

/// Print `message` and wait for a line from `input`.
///
/// End of input is not a confirmation: with stdin closed there is nobody
/// to confirm, so it is an error.
fn wait_for_line<R: BufRead>(mut input: R, message: &str) -> Result<()> {
    print!("{}", message);
    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read input")?;
    if read == 0 {
        println!();
        anyhow::bail!("stdin closed before confirmation");
    }
    Ok(())
}

/// Async wrapper for wait_for_line on stdin
/// Uses spawn_blocking to prevent blocking the async runtime
async fn wait_for_enter(message: String) -> Result<()> {
    tokio::task::spawn_blocking(move || wait_for_line(std::io::stdin().lock(), &message))
        .await
        .context("Prompt task failed")?
}

impl Checkpoint for ConsoleCheckpoint {
    async fn ready_to_fill(&self) -> Result<()> {
        println!();
        println!("ACTION REQUIRED: log in and navigate to the grid editor.");
        wait_for_enter("After you see the data grid, press Enter to continue...".to_string()).await
    }

    async fn review_complete(&self, report: &FillReport) -> Result<()> {
        println!();
        println!("{}", output::format_fill_summary(report, self.use_colors));
        println!();
        println!("Data entry complete. Review the grid, then Save or Publish.");
        wait_for_enter("Press Enter to close the browser...".to_string()).await
    }
}
