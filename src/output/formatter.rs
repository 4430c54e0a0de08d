use std::io::IsTerminal;
use owo_colors::OwoColorize;

use crate::grid::{FillReport, RowOutcome};

/// Whether stdout should get ANSI colors (a terminal, and NO_COLOR unset).
pub fn should_use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Format the score matrix as an aligned table with 1-based row numbers
/// Format: "  {row} | {v1}  {v2}  ..."
pub fn format_matrix(matrix: &[Vec<String>], use_colors: bool) -> String {
    if matrix.is_empty() {
        return "No score data.".to_string();
    }

    let columns = matrix.iter().map(|r| r.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            matrix
                .iter()
                .filter_map(|r| r.get(c))
                .map(|v| v.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    let row_width = matrix.len().to_string().len();

    matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let number = format!("{:>width$}", i + 1, width = row_width);
            let cells = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:>width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join("  ");
            if use_colors {
                format!("{} | {}", number.dimmed(), cells)
            } else {
                format!("{} | {}", number, cells)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the score matrix as tab-separated values, one row per line.
pub fn format_tsv(matrix: &[Vec<String>]) -> String {
    matrix
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of a fill run: final state and totals, then one line per row that needs
/// attention (skipped rows, failed cells).
pub fn format_fill_summary(report: &FillReport, use_colors: bool) -> String {
    let filled = report.filled_rows();
    let partial = report.partial_rows();
    let skipped = report.skipped().count();

    let mut lines = vec![format!("State: {}", report.state)];
    if use_colors {
        lines.push(format!(
            "Rows: {} filled, {} partial, {} skipped ({} cells written)",
            filled.green(),
            partial.yellow(),
            skipped.red(),
            report.cells_written()
        ));
    } else {
        lines.push(format!(
            "Rows: {} filled, {} partial, {} skipped ({} cells written)",
            filled,
            partial,
            skipped,
            report.cells_written()
        ));
    }

    for outcome in &report.rows {
        match outcome {
            RowOutcome::Skipped { position, reason } => {
                let line = format!("  row {}: skipped, {}", position, reason);
                lines.push(if use_colors { line.red().to_string() } else { line });
            }
            RowOutcome::Filled {
                position, failures, ..
            } => {
                for failure in failures {
                    let line = format!(
                        "  row {}, column {}: not written, {}",
                        position, failure.column, failure.error
                    );
                    lines.push(if use_colors { line.yellow().to_string() } else { line });
                }
            }
        }
    }

    lines.join("\n")
}
