//! Output module for reports and library statistics
//!
//! This module handles:
//! - Formatting job reports, catalogs and novel listings as markdown
//! - Loading and printing library statistics

mod report;
pub mod stats;

pub use report::{format_catalog, format_chapter, format_job_report, format_novels};
pub use stats::{load_statistics, print_statistics, LibraryStatistics};
