//! Output formatting module.

pub mod report;
pub mod table;

pub use report::save_log;
pub use table::{print_image_table, print_summary};
