use anyhow::Result;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::report::{CellFailure, FillReport, FillState, RowOutcome, SkipReason};
use super::wait::poll_until;
use super::{CellEvent, GridPage};
use crate::checkpoint::Checkpoint;
use crate::config::Timeouts;

/// Failures that end a fill run. Row and cell failures never do; they are
/// recorded in the [`FillReport`] instead.
#[derive(Debug)]
pub enum FillError {
    /// The landmark never became visible.
    GridNotFound { waited: Duration },
    /// The browser session failed outside row processing.
    Browser(anyhow::Error),
    /// The operator checkpoint could not be completed.
    Checkpoint(anyhow::Error),
}

impl fmt::Display for FillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillError::GridNotFound { waited } => write!(
                f,
                "Could not find the data grid on the page after {}. Make sure the grid is open before continuing",
                humantime::format_duration(*waited)
            ),
            FillError::Browser(e) => write!(f, "Browser error: {:#}", e),
            FillError::Checkpoint(e) => write!(f, "Checkpoint failed: {:#}", e),
        }
    }
}

impl std::error::Error for FillError {}

impl FillError {
    /// The phase the run was in when it failed.
    pub fn phase(&self) -> FillState {
        match self {
            FillError::GridNotFound { .. } => FillState::WaitingForGrid,
            FillError::Browser(_) | FillError::Checkpoint(_) => FillState::AwaitingManualLogin,
        }
    }
}

fn enter(state: &mut FillState, next: FillState) {
    debug!(from = %state, to = %next, "Fill state change");
    *state = next;
}

/// Open `url`, wait for the operator, then type `matrix` into the grid
/// row by row. The page is closed on every path before returning.
pub async fn fill_grid<P, C>(
    page: P,
    url: &str,
    matrix: &[Vec<String>],
    timeouts: &Timeouts,
    checkpoint: &C,
) -> Result<FillReport, FillError>
where
    P: GridPage,
    C: Checkpoint,
{
    let result = drive(&page, url, matrix, timeouts, checkpoint).await;

    info!("Closing browser");
    if let Err(e) = page.close().await {
        warn!("Failed to close browser session: {:#}", e);
    }

    result
}

async fn drive<P, C>(
    page: &P,
    url: &str,
    matrix: &[Vec<String>],
    timeouts: &Timeouts,
    checkpoint: &C,
) -> Result<FillReport, FillError>
where
    P: GridPage,
    C: Checkpoint,
{
    let mut report = FillReport::new();

    info!(url, "Opening target page");
    page.open(url).await.map_err(FillError::Browser)?;
    checkpoint
        .ready_to_fill()
        .await
        .map_err(FillError::Checkpoint)?;

    enter(&mut report.state, FillState::WaitingForGrid);
    let landmark = poll_until(timeouts.grid, timeouts.poll, move || async move {
        Ok(page.landmark_visible().await?.then_some(()))
    })
    .await
    .map_err(FillError::Browser)?;

    if landmark.is_none() {
        error!(
            "Could not find the data grid within {}",
            humantime::format_duration(timeouts.grid)
        );
        return Err(FillError::GridNotFound {
            waited: timeouts.grid,
        });
    }
    info!("Grid is loaded. Preparing for data entry");

    enter(&mut report.state, FillState::ProcessingRows);
    for (index, scores) in matrix.iter().enumerate() {
        let position = index + 1;
        info!(row = position, "Processing row");

        let outcome = match fill_row(page, position, scores, timeouts).await {
            Ok(outcome) => outcome,
            Err(e) => RowOutcome::Skipped {
                position,
                reason: SkipReason::Unexpected(format!("{:#}", e)),
            },
        };

        if let RowOutcome::Skipped { reason, .. } = &outcome {
            warn!(row = position, "Skipping row: {}", reason);
        }
        report.push(outcome);
    }

    enter(&mut report.state, FillState::Completed);
    info!(
        filled = report.filled_rows(),
        partial = report.partial_rows(),
        skipped = report.skipped().count(),
        "Data entry complete"
    );

    // The grid is already filled, so the report is still returned, but the
    // browser closes next and anything not yet saved on the page is lost.
    if let Err(e) = checkpoint.review_complete(&report).await {
        error!(
            "Review checkpoint failed, closing the browser without confirmation: {:#}",
            e
        );
    }

    Ok(report)
}

/// Handle one row. Lookups are fresh on every call; nothing from an
/// earlier row is reused, since the page may have re-rendered since.
async fn fill_row<P: GridPage>(
    page: &P,
    position: usize,
    scores: &[String],
    timeouts: &Timeouts,
) -> Result<RowOutcome> {
    let Some(row) = poll_until(timeouts.row, timeouts.poll, move || page.find_row(position)).await?
    else {
        return Ok(RowOutcome::Skipped {
            position,
            reason: SkipReason::RowNotFound,
        });
    };

    page.scroll_into_view(&row).await?;

    let row_ref = &row;
    let inputs = poll_until(timeouts.inputs, timeouts.poll, move || async move {
        let cells = page.row_inputs(row_ref).await?;
        Ok((!cells.is_empty()).then_some(cells))
    })
    .await?;
    let Some(inputs) = inputs else {
        return Ok(RowOutcome::Skipped {
            position,
            reason: SkipReason::InputsNotFound,
        });
    };

    if inputs.len() != scores.len() {
        return Ok(RowOutcome::Skipped {
            position,
            reason: SkipReason::CountMismatch {
                found: inputs.len(),
                expected: scores.len(),
            },
        });
    }

    let mut failures = Vec::new();
    for (index, (cell, score)) in inputs.iter().zip(scores).enumerate() {
        let column = index + 1;
        match write_cell(page, cell, score).await {
            Ok(()) => debug!(row = position, column, "Inputted score '{}'", score),
            Err(e) => {
                warn!(row = position, column, "Failed to input score: {:#}", e);
                failures.push(CellFailure {
                    column,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    Ok(RowOutcome::Filled {
        position,
        written: inputs.len() - failures.len(),
        failures,
    })
}

/// Set the value directly, then fire input and blur so the page's own
/// handlers pick the change up.
async fn write_cell<P: GridPage>(page: &P, cell: &P::Cell, value: &str) -> Result<()> {
    page.set_value(cell, value).await?;
    page.dispatch(cell, CellEvent::Input).await?;
    page.dispatch(cell, CellEvent::Blur).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn timeouts() -> Timeouts {
        Timeouts {
            grid: Duration::from_millis(40),
            row: Duration::from_millis(40),
            inputs: Duration::from_millis(40),
            poll: Duration::from_millis(2),
        }
    }

    #[derive(Default)]
    struct FakeRow {
        values: Vec<String>,
        /// Lookups that miss before the row shows up.
        hidden_for: usize,
        /// Never render any inputs.
        no_inputs: bool,
        /// Columns (0-based) whose writes fail.
        failing: Vec<usize>,
        /// Lookups of this row error out, as with a stale reference.
        broken: bool,
    }

    fn row(values: &[&str]) -> FakeRow {
        FakeRow {
            values: values.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct FakeState {
        landmark: bool,
        fail_open: bool,
        rows: RefCell<Vec<FakeRow>>,
        opened: RefCell<Option<String>>,
        lookups: RefCell<Vec<usize>>,
        scrolled: RefCell<Vec<usize>>,
        log: RefCell<Vec<String>>,
        closed: Cell<bool>,
    }

    impl FakeState {
        fn values(&self, row: usize) -> Vec<String> {
            self.rows.borrow()[row].values.clone()
        }
    }

    struct FakeGrid(Rc<FakeState>);

    impl GridPage for FakeGrid {
        type Row = usize;
        type Cell = (usize, usize);

        async fn open(&self, url: &str) -> Result<()> {
            if self.0.fail_open {
                return Err(anyhow!("connection refused"));
            }
            *self.0.opened.borrow_mut() = Some(url.to_string());
            Ok(())
        }

        async fn landmark_visible(&self) -> Result<bool> {
            Ok(self.0.landmark)
        }

        async fn find_row(&self, position: usize) -> Result<Option<usize>> {
            self.0.lookups.borrow_mut().push(position);
            let mut rows = self.0.rows.borrow_mut();
            let Some(row) = rows.get_mut(position - 1) else {
                return Ok(None);
            };
            if row.broken {
                return Err(anyhow!("stale element reference"));
            }
            if row.hidden_for > 0 {
                row.hidden_for -= 1;
                return Ok(None);
            }
            Ok(Some(position - 1))
        }

        async fn scroll_into_view(&self, row: &usize) -> Result<()> {
            self.0.scrolled.borrow_mut().push(*row + 1);
            Ok(())
        }

        async fn row_inputs(&self, row: &usize) -> Result<Vec<(usize, usize)>> {
            let rows = self.0.rows.borrow();
            let fake = &rows[*row];
            if fake.no_inputs {
                return Ok(Vec::new());
            }
            Ok((0..fake.values.len()).map(|c| (*row, c)).collect())
        }

        async fn set_value(&self, cell: &(usize, usize), value: &str) -> Result<()> {
            let (r, c) = *cell;
            if self.0.rows.borrow()[r].failing.contains(&c) {
                return Err(anyhow!("element is not interactable"));
            }
            self.0.rows.borrow_mut()[r].values[c] = value.to_string();
            self.0
                .log
                .borrow_mut()
                .push(format!("r{}c{} value={}", r + 1, c + 1, value));
            Ok(())
        }

        async fn dispatch(&self, cell: &(usize, usize), event: CellEvent) -> Result<()> {
            self.0
                .log
                .borrow_mut()
                .push(format!("r{}c{} {}", cell.0 + 1, cell.1 + 1, event));
            Ok(())
        }

        async fn close(self) -> Result<()> {
            self.0.closed.set(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCheckpoint {
        ready: Cell<u32>,
        reviewed: RefCell<Option<FillReport>>,
        fail_ready: bool,
        fail_review: bool,
    }

    impl Checkpoint for RecordingCheckpoint {
        async fn ready_to_fill(&self) -> Result<()> {
            self.ready.set(self.ready.get() + 1);
            if self.fail_ready {
                return Err(anyhow!("stdin closed"));
            }
            Ok(())
        }

        async fn review_complete(&self, report: &FillReport) -> Result<()> {
            *self.reviewed.borrow_mut() = Some(report.clone());
            if self.fail_review {
                return Err(anyhow!("stdin closed before confirmation"));
            }
            Ok(())
        }
    }

    fn grid(rows: Vec<FakeRow>) -> Rc<FakeState> {
        Rc::new(FakeState {
            landmark: true,
            rows: RefCell::new(rows),
            ..Default::default()
        })
    }

    fn matrix(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_fills_cells_in_order_with_input_then_blur() {
        let state = grid(vec![row(&["", "", ""])]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com/editor",
            &matrix(&[&["10", "20", "30"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(state.values(0), vec!["10", "20", "30"]);
        assert_eq!(
            *state.log.borrow(),
            vec![
                "r1c1 value=10", "r1c1 input", "r1c1 blur",
                "r1c2 value=20", "r1c2 input", "r1c2 blur",
                "r1c3 value=30", "r1c3 input", "r1c3 blur",
            ]
        );
        assert_eq!(
            report.rows,
            vec![RowOutcome::Filled {
                position: 1,
                written: 3,
                failures: vec![],
            }]
        );
        assert_eq!(report.state, FillState::Completed);
        assert_eq!(state.opened.borrow().as_deref(), Some("https://example.com/editor"));
        assert_eq!(*state.scrolled.borrow(), vec![1]);
        assert_eq!(checkpoint.ready.get(), 1);
        assert_eq!(checkpoint.reviewed.borrow().as_ref(), Some(&report));
        assert!(state.closed.get());
    }

    #[tokio::test]
    async fn test_count_mismatch_skips_row_untouched() {
        let state = grid(vec![row(&["1", "2"]), row(&["", ""])]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["10", "20", "30"], &["40", "50"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(state.values(0), vec!["1", "2"]);
        assert_eq!(state.values(1), vec!["40", "50"]);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, 1);
        assert!(skipped[0].1.to_string().contains("found 2, have 3"));
        assert!(state.log.borrow().iter().all(|entry| entry.starts_with("r2")));
    }

    #[tokio::test]
    async fn test_missing_landmark_is_grid_not_found_and_closes() {
        let state = Rc::new(FakeState {
            landmark: false,
            rows: RefCell::new(vec![row(&[""])]),
            ..Default::default()
        });
        let checkpoint = RecordingCheckpoint::default();

        let err = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["10"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FillError::GridNotFound { .. }));
        assert_eq!(err.phase(), FillState::WaitingForGrid);
        assert!(state.closed.get());
        assert!(state.lookups.borrow().is_empty());
        assert!(checkpoint.reviewed.borrow().is_none());
    }

    #[tokio::test]
    async fn test_missing_row_is_skipped_and_later_rows_filled() {
        // Grid has a single row; the matrix has two.
        let state = grid(vec![row(&[""])]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["7"], &["8"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(state.values(0), vec!["7"]);
        assert_eq!(
            report.rows[1],
            RowOutcome::Skipped {
                position: 2,
                reason: SkipReason::RowNotFound,
            }
        );
    }

    #[tokio::test]
    async fn test_rows_that_render_late_are_waited_for() {
        let mut late = row(&["", ""]);
        late.hidden_for = 3;
        let state = grid(vec![late]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1", "2"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert!(report.is_clean());
        assert_eq!(state.values(0), vec!["1", "2"]);
        assert_eq!(*state.lookups.borrow(), vec![1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_row_without_inputs_is_skipped() {
        let mut empty = row(&["", ""]);
        empty.no_inputs = true;
        let state = grid(vec![empty, row(&[""])]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1", "2"], &["3"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(
            report.rows[0],
            RowOutcome::Skipped {
                position: 1,
                reason: SkipReason::InputsNotFound,
            }
        );
        assert_eq!(state.values(1), vec!["3"]);
    }

    #[tokio::test]
    async fn test_cell_failure_does_not_stop_row() {
        let mut flaky = row(&["", "", ""]);
        flaky.failing = vec![1];
        let state = grid(vec![flaky]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["10", "20", "30"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(state.values(0), vec!["10", "", "30"]);
        match &report.rows[0] {
            RowOutcome::Filled { written, failures, .. } => {
                assert_eq!(*written, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].column, 2);
                assert!(failures[0].error.contains("not interactable"));
            }
            other => panic!("expected filled row, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filling_twice_gives_same_values() {
        let state = grid(vec![row(&["", ""]), row(&["", ""])]);
        let data = matrix(&[&["1", "2"], &["3", "4"]]);

        for _ in 0..2 {
            let checkpoint = RecordingCheckpoint::default();
            fill_grid(
                FakeGrid(state.clone()),
                "https://example.com",
                &data,
                &timeouts(),
                &checkpoint,
            )
            .await
            .unwrap();
            assert_eq!(state.values(0), vec!["1", "2"]);
            assert_eq!(state.values(1), vec!["3", "4"]);
        }
    }

    #[tokio::test]
    async fn test_extra_grid_rows_are_not_visited() {
        let state = grid(vec![row(&["a"]), row(&["b"]), row(&["c"])]);
        let checkpoint = RecordingCheckpoint::default();

        fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(*state.lookups.borrow(), vec![1]);
        assert_eq!(state.values(1), vec!["b"]);
        assert_eq!(state.values(2), vec!["c"]);
    }

    #[tokio::test]
    async fn test_open_failure_still_closes() {
        let state = Rc::new(FakeState {
            fail_open: true,
            landmark: true,
            ..Default::default()
        });
        let checkpoint = RecordingCheckpoint::default();

        let err = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FillError::Browser(_)));
        assert_eq!(checkpoint.ready.get(), 0);
        assert!(state.closed.get());
    }

    #[tokio::test]
    async fn test_failed_ready_checkpoint_aborts_before_grid() {
        let state = grid(vec![row(&[""])]);
        let checkpoint = RecordingCheckpoint {
            fail_ready: true,
            ..Default::default()
        };

        let err = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FillError::Checkpoint(_)));
        assert_eq!(err.phase(), FillState::AwaitingManualLogin);
        assert!(state.lookups.borrow().is_empty());
        assert!(state.closed.get());
    }

    #[tokio::test]
    async fn test_row_error_is_isolated_and_later_rows_filled() {
        let mut stale = row(&[""]);
        stale.broken = true;
        let state = grid(vec![stale, row(&[""])]);
        let checkpoint = RecordingCheckpoint::default();

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["1"], &["2"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert_eq!(
            report.rows,
            vec![
                RowOutcome::Skipped {
                    position: 1,
                    reason: SkipReason::Unexpected("stale element reference".to_string()),
                },
                RowOutcome::Filled {
                    position: 2,
                    written: 1,
                    failures: vec![],
                },
            ]
        );
        assert_eq!(state.values(0), vec![""]);
        assert_eq!(state.values(1), vec!["2"]);
        assert_eq!(report.state, FillState::Completed);
    }

    #[tokio::test]
    async fn test_failed_review_still_returns_report_and_closes() {
        let state = grid(vec![row(&["", ""])]);
        let checkpoint = RecordingCheckpoint {
            fail_review: true,
            ..Default::default()
        };

        let report = fill_grid(
            FakeGrid(state.clone()),
            "https://example.com",
            &matrix(&[&["5", "6"]]),
            &timeouts(),
            &checkpoint,
        )
        .await
        .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.state, FillState::Completed);
        assert!(checkpoint.reviewed.borrow().is_some());
        assert_eq!(state.values(0), vec!["5", "6"]);
        assert!(state.closed.get());
    }

    #[test]
    fn test_grid_not_found_message() {
        let err = FillError::GridNotFound {
            waited: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("after 30s"));
    }
}
