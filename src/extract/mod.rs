//! Record extraction
//!
//! This module contains the pure projection from a page to records, plus the
//! record and result-set types the crawler accumulates.

mod extractor;
mod record;

pub use extractor::extract;
pub use record::{Record, ResultSet};

use crate::config::FieldSpec;
use scraper::Html;
use thiserror::Error;

/// Errors raised by field extraction
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Field list is empty")]
    EmptyFieldList,

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Parses `html` and extracts records from it
pub fn extract_from_html(html: &str, fields: &[FieldSpec]) -> Result<Vec<Record>, ExtractError> {
    let document = Html::parse_document(html);
    extract(&document, fields)
}
