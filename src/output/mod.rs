//! Output module for crawl reports
//!
//! This module handles:
//! - Exporting a crawl report and its records as JSON
//! - Printing a human-readable summary of a crawl

mod json;
mod summary;

pub use json::{report_to_json, write_report_json, ReportView};
pub use summary::{format_summary, print_summary};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
