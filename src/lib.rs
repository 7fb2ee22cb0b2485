//! Pagesweep: a paginated page harvester
//!
//! This crate drives a rendered page through its pagination (none, infinite
//! scroll or a "next" control), extracting field-level records from every page
//! state it reaches and aggregating them into a single result set.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod messaging;
pub mod output;
pub mod selector;
pub mod target;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("No crawl config found")]
    ConfigMissing,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No active target to crawl")]
    NoTarget,

    #[error("No template is selected in the crawl config")]
    NoTemplateSelected,

    #[error("Selected template has no fields")]
    EmptyFieldList,

    #[error("A crawl is already running")]
    CrawlAlreadyRunning,

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Advance failed: {0}")]
    AdvanceFailed(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crawler::DriverState,
        to: crawler::DriverState,
    },
}

impl CrawlError {
    /// Returns true for errors detected before any pagination step runs
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing
                | Self::Config(_)
                | Self::NoTarget
                | Self::NoTemplateSelected
                | Self::EmptyFieldList
                | Self::CrawlAlreadyRunning
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{CrawlConfig, FieldSpec, PaginationSpec, Template};
pub use crawler::{CrawlReport, CrawlStatus, DriverState, Orchestrator};
pub use extract::{extract, Record, ResultSet};
pub use selector::resolve_selector;
