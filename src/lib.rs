pub mod checkpoint;
pub mod config;
pub mod grid;
pub mod output;
pub mod sheets;

pub use sheets::ScoreMatrix;
