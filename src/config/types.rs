use serde::{Deserialize, Serialize};

/// Crawl configuration as written by the template editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// How further pages of the document are reached
    pub pagination: PaginationSpec,

    /// Field templates; at most one is selected
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl CrawlConfig {
    /// Returns the template marked as selected, if any
    pub fn selected_template(&self) -> Option<&Template> {
        self.templates.iter().find(|t| t.selected)
    }
}

/// Pagination strategy, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationSpec {
    /// Single page, scraped once
    None,

    /// Infinite scroll: scrape, scroll to the bottom, wait, repeat
    ScrollDown {
        /// Number of scrape/scroll rounds
        #[serde(rename = "scrollCount")]
        scroll_count: u32,

        /// Settle time after each scroll (milliseconds)
        #[serde(rename = "scrollInterval")]
        scroll_interval: u64,
    },

    /// Click-through: scrape, click the next-page control, wait for load
    Click {
        /// Selector of the next-page control
        #[serde(rename = "nextPageSelector")]
        next_page_selector: String,
    },
}

impl PaginationSpec {
    /// Short name matching the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ScrollDown { .. } => "scroll_down",
            Self::Click { .. } => "click",
        }
    }
}

/// A named set of fields to extract from each page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether this template is the active one
    #[serde(default)]
    pub selected: bool,

    /// Ordered fields; the first one decides how many records a page yields
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// A single named field and the selector that locates its values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
        }
    }
}
