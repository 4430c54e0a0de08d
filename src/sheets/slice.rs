use super::ScoreMatrix;

/// Cut the score block out of a raw sheet.
///
/// `start_row` and `start_col` are 1-based. Returns `None` when the sheet
/// has fewer than `start_row` rows. A row shorter than the start column
/// becomes an empty row so later rows keep their positions.
pub fn slice_scores(raw: Vec<Vec<String>>, start_row: usize, start_col: usize) -> Option<ScoreMatrix> {
    let row_offset = start_row.saturating_sub(1);
    let col_offset = start_col.saturating_sub(1);

    if raw.is_empty() || raw.len() < start_row {
        return None;
    }

    Some(
        raw.into_iter()
            .skip(row_offset)
            .map(|row| row.into_iter().skip(col_offset).collect())
            .collect(),
    )
}
