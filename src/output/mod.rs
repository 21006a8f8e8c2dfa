//! Output writers for reports.
//!
//! This module handles writing data to disk:
//! - JSON statistics reports

pub mod json;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
