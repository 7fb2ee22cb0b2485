//! Configuration sources
//!
//! The crawl core only reads the `crawlConfig` value; writing it belongs to the
//! template editor. These types model where that value lives.

use crate::config::parser::{hash_content, parse_config, ConfigFormat};
use crate::config::types::{CrawlConfig, PaginationSpec};
use crate::config::validation::{validate, validate_selector};
use crate::ConfigError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;

/// A loaded config together with the hash of its serialized form
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CrawlConfig,
    pub hash: Option<String>,
}

/// Read access to the stored crawl config
pub trait ConfigSource: Send + Sync {
    /// Returns `Ok(None)` when no config has been stored yet
    fn load(&self) -> Result<Option<LoadedConfig>, ConfigError>;
}

/// Receiver of selectors chosen with the pagination picker
pub trait SelectorSink: Send + Sync {
    fn pagination_selector_picked(&self, selector: &str) -> Result<(), ConfigError>;
}

/// Config stored in a JSON or TOML file
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replaces the file contents in one step
    ///
    /// The new contents go to a temporary file next to the config, which is
    /// then renamed over it, so a concurrent `load` sees the old or the new
    /// file and never a partial one.
    fn replace_contents(&self, content: &str) -> Result<(), ConfigError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged.flush()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<Option<LoadedConfig>, ConfigError> {
        let format = ConfigFormat::from_path(&self.path)?;
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let config = parse_config(&content, format)?;
        Ok(Some(LoadedConfig {
            config,
            hash: Some(hash_content(&content)),
        }))
    }
}

impl SelectorSink for FileConfigSource {
    /// Rewrites the file with `click` pagination, creating it if missing
    fn pagination_selector_picked(&self, selector: &str) -> Result<(), ConfigError> {
        validate_selector(selector)?;
        let format = ConfigFormat::from_path(&self.path)?;

        let current = self.load()?.map(|loaded| loaded.config);
        let config = with_click_pagination(current, selector);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
            ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        };
        self.replace_contents(&content)?;

        tracing::debug!(
            "Pagination selector '{}' written to {}",
            selector,
            self.path.display()
        );
        Ok(())
    }
}

fn with_click_pagination(config: Option<CrawlConfig>, selector: &str) -> CrawlConfig {
    let pagination = PaginationSpec::Click {
        next_page_selector: selector.to_string(),
    };
    match config {
        Some(config) => CrawlConfig { pagination, ..config },
        None => CrawlConfig {
            pagination,
            templates: Vec::new(),
        },
    }
}

/// In-memory config slot, shared between the editor side and the crawler
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    slot: RwLock<Option<CrawlConfig>>,
}

impl MemoryConfigStore {
    pub fn new(config: Option<CrawlConfig>) -> Self {
        Self {
            slot: RwLock::new(config),
        }
    }

    /// Replaces the stored config
    pub fn set(&self, config: CrawlConfig) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(config);
    }

    /// Removes the stored config
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Returns a copy of the stored config
    pub fn get(&self) -> Option<CrawlConfig> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ConfigSource for MemoryConfigStore {
    fn load(&self) -> Result<Option<LoadedConfig>, ConfigError> {
        match self.get() {
            Some(config) => {
                validate(&config)?;
                Ok(Some(LoadedConfig { config, hash: None }))
            }
            None => Ok(None),
        }
    }
}

impl SelectorSink for MemoryConfigStore {
    /// Switches pagination to `click` using the picked selector
    fn pagination_selector_picked(&self, selector: &str) -> Result<(), ConfigError> {
        validate_selector(selector)?;

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        let current = slot.take();
        *slot = Some(with_click_pagination(current, selector));

        tracing::debug!("Pagination selector set to '{}'", selector);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::Builder;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("crawlConfig.json"));
        assert!(source.load().unwrap().is_none());
    }

    #[test]
    fn test_file_source_reports_hash() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"pagination": {"type": "none"}}"#).unwrap();
        file.flush().unwrap();

        let loaded = FileConfigSource::new(file.path()).load().unwrap().unwrap();
        assert_eq!(loaded.config.pagination, PaginationSpec::None);
        assert_eq!(loaded.hash.map(|h| h.len()), Some(64));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{not json").unwrap();
        file.flush().unwrap();

        assert!(FileConfigSource::new(file.path()).load().is_err());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryConfigStore::default();
        assert!(store.load().unwrap().is_none());

        store.set(CrawlConfig {
            pagination: PaginationSpec::None,
            templates: vec![],
        });
        assert!(store.load().unwrap().is_some());

        store.clear();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_picked_selector_switches_to_click() {
        let store = MemoryConfigStore::new(Some(CrawlConfig {
            pagination: PaginationSpec::ScrollDown {
                scroll_count: 2,
                scroll_interval: 100,
            },
            templates: vec![],
        }));

        store
            .pagination_selector_picked("#pager > a:nth-of-type(2)")
            .unwrap();

        assert_eq!(
            store.get().unwrap().pagination,
            PaginationSpec::Click {
                next_page_selector: "#pager > a:nth-of-type(2)".to_string()
            }
        );
    }

    #[test]
    fn test_picked_selector_rewrites_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[pagination]
type = "none"

[[templates]]
selected = true
fields = [{ name = "title", selector = "h2" }]
"#,
        )
        .unwrap();
        file.flush().unwrap();

        let source = FileConfigSource::new(file.path());
        source.pagination_selector_picked("#pager > a").unwrap();

        let config = source.load().unwrap().unwrap().config;
        assert_eq!(
            config.pagination,
            PaginationSpec::Click {
                next_page_selector: "#pager > a".to_string()
            }
        );
        assert_eq!(config.templates[0].fields[0].selector, "h2");
    }

    #[test]
    fn test_picked_selector_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("crawlConfig.json"));

        source.pagination_selector_picked("a.next").unwrap();

        let config = source.load().unwrap().unwrap().config;
        assert_eq!(config.pagination.kind(), "click");
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_load_during_picks_sees_whole_file() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(
            br#"{
                "pagination": {"type": "none"},
                "templates": [{"selected": true, "fields": [{"name": "title", "selector": "h2"}]}]
            }"#,
        )
        .unwrap();
        file.flush().unwrap();

        let source = Arc::new(FileConfigSource::new(file.path()));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let source = source.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut n = 0;
                while !done.load(Ordering::SeqCst) {
                    source
                        .pagination_selector_picked(&format!("li:nth-of-type({}) > a", n % 9 + 1))
                        .unwrap();
                    n += 1;
                }
            })
        };

        for _ in 0..2000 {
            let config = source.load().unwrap().unwrap().config;
            assert_eq!(config.templates[0].fields[0].selector, "h2");
        }

        done.store(true, Ordering::SeqCst);
        writer.join().unwrap();
    }

    #[test]
    fn test_rewrite_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("crawlConfig.toml"));

        source.pagination_selector_picked("a.next").unwrap();
        source.pagination_selector_picked("a.more").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            source.load().unwrap().unwrap().config.pagination,
            PaginationSpec::Click {
                next_page_selector: "a.more".to_string()
            }
        );
    }

    #[test]
    fn test_picked_selector_must_parse() {
        let store = MemoryConfigStore::default();
        assert!(store.pagination_selector_picked("a[").is_err());
        assert!(store.get().is_none());
    }
}
