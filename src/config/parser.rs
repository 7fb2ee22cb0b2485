use crate::config::types::CrawlConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// On-disk encoding of a crawl config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// The shape the template editor stores (`crawlConfig` value)
    Json,
    Toml,
}

impl ConfigFormat {
    /// Picks the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Parses and validates a configuration from a string
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<CrawlConfig, ConfigError> {
    let config: CrawlConfig = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };

    validate(&config)?;

    Ok(config)
}

/// Loads and parses a configuration file from the given path
///
/// The format is chosen by extension (`.json` or `.toml`).
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pagesweep::config::load_config;
///
/// let config = load_config(Path::new("crawl.json")).unwrap();
/// println!("Pagination: {}", config.pagination.kind());
/// ```
pub fn load_config(path: &Path) -> Result<CrawlConfig, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Reported alongside crawl results so a result file can be traced back to
/// the exact configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(CrawlConfig, String), ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, format)?;
    Ok((config, hash_content(&content)))
}
