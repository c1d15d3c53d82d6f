// src/process/mod.rs

pub mod dataset;
pub mod table;
pub mod utils;

pub use dataset::{DatasetProcessor, Outcome, SkipReason};
pub use table::ProcessedTable;
pub use utils::normalize;
