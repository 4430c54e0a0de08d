use std::fmt;

/// Phases of a fill run. A run that fails leaves through a
/// [`FillError`](super::FillError) carrying the phase it failed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillState {
    #[default]
    AwaitingManualLogin,
    WaitingForGrid,
    ProcessingRows,
    Completed,
}

impl fmt::Display for FillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillState::AwaitingManualLogin => "awaiting manual login",
            FillState::WaitingForGrid => "waiting for grid",
            FillState::ProcessingRows => "processing rows",
            FillState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why a row was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The row never appeared within the row timeout.
    RowNotFound,
    /// The row appeared but no input cells rendered in time.
    InputsNotFound,
    /// Destination cell count differs from the number of source values.
    CountMismatch { found: usize, expected: usize },
    /// Any other failure while handling the row.
    Unexpected(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RowNotFound => write!(f, "row not found within the time limit"),
            SkipReason::InputsNotFound => write!(f, "no inputs rendered within the time limit"),
            SkipReason::CountMismatch { found, expected } => {
                write!(f, "count mismatch: found {}, have {}", found, expected)
            }
            SkipReason::Unexpected(msg) => write!(f, "unexpected error: {}", msg),
        }
    }
}

/// A single cell that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    /// 1-based column within the row.
    pub column: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Filled {
        position: usize,
        written: usize,
        failures: Vec<CellFailure>,
    },
    Skipped {
        position: usize,
        reason: SkipReason,
    },
}

/// Per-row result of a fill run, in row order, and the last phase reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub state: FillState,
    pub rows: Vec<RowOutcome>,
}

impl FillReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: RowOutcome) {
        self.rows.push(outcome);
    }

    /// Rows where every cell was written.
    pub fn filled_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, RowOutcome::Filled { failures, .. } if failures.is_empty()))
            .count()
    }

    /// Rows that were written but lost one or more cells.
    pub fn partial_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, RowOutcome::Filled { failures, .. } if !failures.is_empty()))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &SkipReason)> {
        self.rows.iter().filter_map(|r| match r {
            RowOutcome::Skipped { position, reason } => Some((*position, reason)),
            RowOutcome::Filled { .. } => None,
        })
    }

    pub fn cells_written(&self) -> usize {
        self.rows
            .iter()
            .map(|r| match r {
                RowOutcome::Filled { written, .. } => *written,
                RowOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    pub fn cell_failures(&self) -> impl Iterator<Item = (usize, &CellFailure)> {
        self.rows.iter().flat_map(|r| {
            let (position, failures) = match r {
                RowOutcome::Filled { position, failures, .. } => (*position, failures.as_slice()),
                RowOutcome::Skipped { position, .. } => (*position, &[][..]),
            };
            failures.iter().map(move |f| (position, f))
        })
    }

    pub fn is_clean(&self) -> bool {
        self.rows
            .iter()
            .all(|r| matches!(r, RowOutcome::Filled { failures, .. } if failures.is_empty()))
    }
}
