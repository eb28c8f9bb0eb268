mod table;
mod tracker;

pub use table::Formatter;
pub use tracker::{ProgressBoard, ProgressBoardBuilder};
