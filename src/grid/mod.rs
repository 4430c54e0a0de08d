//! Grid filler: types score rows into a web data grid by position.

pub mod filler;
pub mod report;
pub mod wait;
pub mod webdriver;

pub use filler::{fill_grid, FillError};
pub use report::{CellFailure, FillReport, FillState, RowOutcome, SkipReason};
pub use webdriver::WebDriverPage;

use anyhow::Result;
use std::fmt;

/// Notification dispatched on a cell after its value is set, so the host
/// page reacts as if a user had typed the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEvent {
    Input,
    Blur,
}

impl CellEvent {
    pub fn name(self) -> &'static str {
        match self {
            CellEvent::Input => "input",
            CellEvent::Blur => "blur",
        }
    }
}

impl fmt::Display for CellEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A page holding an editable grid, addressed by position.
///
/// Lookups return `Ok(None)` / an empty list when nothing matches yet;
/// errors are reserved for a broken session or a command the page
/// rejected. Row and cell handles are only used within one row pass.
#[allow(async_fn_in_trait)]
pub trait GridPage {
    type Row;
    type Cell;

    async fn open(&self, url: &str) -> Result<()>;

    /// Whether the landmark marking a rendered grid is visible.
    async fn landmark_visible(&self) -> Result<bool>;

    /// Locate the data row at `position` (1-based).
    async fn find_row(&self, position: usize) -> Result<Option<Self::Row>>;

    async fn scroll_into_view(&self, row: &Self::Row) -> Result<()>;

    /// Input cells of `row`, in column order.
    async fn row_inputs(&self, row: &Self::Row) -> Result<Vec<Self::Cell>>;

    async fn set_value(&self, cell: &Self::Cell, value: &str) -> Result<()>;

    async fn dispatch(&self, cell: &Self::Cell, event: CellEvent) -> Result<()>;

    /// End the browser session.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
