pub mod formatter;

pub use formatter::{format_fill_summary, format_matrix, format_tsv, should_use_colors};
