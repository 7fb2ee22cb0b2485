//! Crawler module for paginated extraction
//!
//! This module contains the core crawling logic, including:
//! - The pagination driver state machine (none, scroll, click)
//! - The per-crawl session that owns the result set
//! - The orchestrator behind `startCrawl`

mod orchestrator;
mod pagination;
mod report;
mod session;
mod state;

pub use orchestrator::Orchestrator;
pub use pagination::{AdvanceOutcome, PageEffects, PaginationDriver, PAGE_LOAD_TIMEOUT};
pub use report::{CrawlReport, CrawlStatus};
pub use session::{CrawlSession, TargetEffects};
pub use state::DriverState;
