//! Crawl orchestrator - the `startCrawl` entry point
//!
//! This module owns the crawl lifecycle:
//! - Rejecting overlapping crawls
//! - Loading the config and resolving the target and template
//! - Running the pagination driver against a fresh session
//! - Turning the outcome into a `CrawlReport`

use crate::config::ConfigSource;
use crate::crawler::pagination::{PaginationDriver, PAGE_LOAD_TIMEOUT};
use crate::crawler::report::{CrawlReport, CrawlStatus};
use crate::crawler::session::{CrawlSession, TargetEffects};
use crate::target::TargetProvider;
use crate::CrawlError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Clears the in-flight flag on every exit path
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs crawls against the active target, one at a time
pub struct Orchestrator {
    config: Arc<dyn ConfigSource>,
    targets: Arc<dyn TargetProvider>,
    running: AtomicBool,
    load_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: Arc<dyn ConfigSource>, targets: Arc<dyn TargetProvider>) -> Self {
        Self {
            config,
            targets,
            running: AtomicBool::new(false),
            load_timeout: PAGE_LOAD_TIMEOUT,
        }
    }

    /// Overrides how long a click advance waits for the next page
    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a crawl
    ///
    /// Setup problems (no config, no target, no selected template, no fields,
    /// a crawl already running) are returned as errors. Once pagination has
    /// started the crawl always yields a report; a failed scrape or advance
    /// shows up as `CrawlStatus::Failed` next to the records gathered so far.
    pub async fn start_crawl(&self) -> Result<CrawlReport, CrawlError> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            tracing::warn!("Ignoring startCrawl: a crawl is already running");
            return Err(CrawlError::CrawlAlreadyRunning);
        };

        let session = CrawlSession::new();
        match self.run(session).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Crawl not started: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, mut session: CrawlSession) -> Result<CrawlReport, CrawlError> {
        let loaded = self.config.load()?.ok_or(CrawlError::ConfigMissing)?;
        let target = self.targets.active_target().ok_or(CrawlError::NoTarget)?;

        let config = loaded.config;
        let template = config
            .selected_template()
            .ok_or(CrawlError::NoTemplateSelected)?;
        if template.fields.is_empty() {
            return Err(CrawlError::EmptyFieldList);
        }

        tracing::info!(
            "Crawl {} started on {} ({} pagination, {} fields)",
            session.id(),
            target.id(),
            config.pagination.kind(),
            template.fields.len()
        );

        let mut driver = PaginationDriver::with_load_timeout(self.load_timeout);
        let outcome = {
            let mut effects = TargetEffects::new(&target, &template.fields, &mut session);
            driver.run(&config.pagination, &mut effects).await
        };

        let status = match outcome {
            Ok(()) => {
                tracing::info!(
                    "Crawl {} completed: {} records from {} pages",
                    session.id(),
                    session.results().len(),
                    driver.pages_scraped()
                );
                CrawlStatus::Completed
            }
            Err(e) => {
                tracing::error!(
                    "Crawl {} failed after {} pages, keeping {} records: {}",
                    session.id(),
                    driver.pages_scraped(),
                    session.results().len(),
                    e
                );
                CrawlStatus::Failed(e)
            }
        };

        Ok(CrawlReport {
            session_id: session.id(),
            target: target.id(),
            status,
            pages_scraped: driver.pages_scraped(),
            advances: driver.advances(),
            final_state: driver.state(),
            started_at: session.started_at(),
            finished_at: Utc::now(),
            config_hash: loaded.hash,
            records: session.into_results().into_records(),
        })
    }
}
