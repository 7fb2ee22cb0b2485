//! Configuration module for Pagesweep
//!
//! This module handles loading, parsing, and validating crawl configurations
//! (the `crawlConfig` value: pagination strategy plus field templates).
//!
//! # Example
//!
//! ```no_run
//! use pagesweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.json")).unwrap();
//! println!("Templates: {}", config.templates.len());
//! ```

mod parser;
mod store;
mod types;
mod validation;

// Re-export types
pub use types::{CrawlConfig, FieldSpec, PaginationSpec, Template};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, ConfigFormat,
};
pub use store::{ConfigSource, FileConfigSource, LoadedConfig, MemoryConfigStore, SelectorSink};
pub use validation::{validate, validate_selector};
