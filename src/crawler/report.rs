//! Crawl outcome

use crate::crawler::state::DriverState;
use crate::extract::Record;
use crate::messaging::TargetId;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How a crawl that got past setup ended
#[derive(Debug)]
pub enum CrawlStatus {
    Completed,

    /// A scrape or advance failed; the records gathered before it are kept
    Failed(CrawlError),
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of one `startCrawl`
#[derive(Debug)]
pub struct CrawlReport {
    pub session_id: Uuid,
    pub target: TargetId,
    pub status: CrawlStatus,
    pub records: Vec<Record>,
    pub pages_scraped: usize,
    pub advances: usize,
    pub final_state: DriverState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Hash of the config file content, when the config came from a file
    pub config_hash: Option<String>,
}

impl CrawlReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CrawlStatus::Completed)
    }

    pub fn error(&self) -> Option<&CrawlError> {
        match &self.status {
            CrawlStatus::Completed => None,
            CrawlStatus::Failed(e) => Some(e),
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
