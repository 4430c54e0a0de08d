//! Human checkpoints gating the fill run: one before the grid is touched
//! (manual login done), one after (review, save, publish).

mod console;

pub use console::ConsoleCheckpoint;

use anyhow::Result;

use crate::grid::FillReport;

#[allow(async_fn_in_trait)]
pub trait Checkpoint {
    /// Resolves once the operator has logged in and opened the grid.
    async fn ready_to_fill(&self) -> Result<()>;

    /// Resolves once the operator has reviewed the filled grid. The browser
    /// is closed right after.
    async fn review_complete(&self, report: &FillReport) -> Result<()>;
}
