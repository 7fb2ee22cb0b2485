//! Pagination driver
//!
//! Runs one of the three pagination strategies as a sequence of validated
//! state transitions. The page-facing work (scraping, scrolling, clicking)
//! is behind `PageEffects`, so the driver itself only decides what happens
//! next.

use crate::config::PaginationSpec;
use crate::crawler::state::DriverState;
use crate::CrawlError;
use async_trait::async_trait;
use std::time::Duration;

/// How long a click advance waits for the next page to load
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a click advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// No matching control; pagination is over
    Exhausted,

    /// The control was clicked and the target reported load-complete
    Loaded,

    /// The control was clicked but no load-complete arrived in time
    TimedOut,
}

/// Page-facing effects the driver issues
#[async_trait]
pub trait PageEffects: Send {
    /// Scrapes the current page state and stores the records
    ///
    /// Returns the number of records scraped.
    async fn scrape_and_store(&mut self) -> Result<usize, CrawlError>;

    /// Scrolls to the bottom of the page without waiting for a reply
    async fn scroll_to_bottom(&mut self) -> Result<(), CrawlError>;

    /// Waits `interval` for scrolled-in content to render
    ///
    /// Fails when the page goes away before the interval elapses.
    async fn settle(&mut self, interval: Duration) -> Result<(), CrawlError>;

    /// Clicks the next-page control and waits up to `load_timeout` for the load
    async fn click_next_page(
        &mut self,
        selector: &str,
        load_timeout: Duration,
    ) -> Result<AdvanceOutcome, CrawlError>;
}

/// State machine that paginates a target to completion
#[derive(Debug)]
pub struct PaginationDriver {
    state: DriverState,
    pages_scraped: usize,
    advances: usize,
    load_timeout: Duration,
}

impl Default for PaginationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationDriver {
    pub fn new() -> Self {
        Self::with_load_timeout(PAGE_LOAD_TIMEOUT)
    }

    pub fn with_load_timeout(load_timeout: Duration) -> Self {
        Self {
            state: DriverState::Idle,
            pages_scraped: 0,
            advances: 0,
            load_timeout,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of completed scrape steps
    pub fn pages_scraped(&self) -> usize {
        self.pages_scraped
    }

    /// Number of scroll or click advances that moved the page on
    pub fn advances(&self) -> usize {
        self.advances
    }

    /// Drives pagination until `Done` or `Failed`
    ///
    /// The driver runs once; a second call fails with `InvalidTransition`.
    /// On error the driver ends in `Failed` and the error is returned as is.
    pub async fn run<E: PageEffects>(
        &mut self,
        spec: &PaginationSpec,
        effects: &mut E,
    ) -> Result<(), CrawlError> {
        let result = self.drive(spec, effects).await;

        if let Err(e) = &result {
            if !self.state.is_terminal() {
                tracing::debug!("Driver failed in state {}: {}", self.state, e);
                self.state = DriverState::Failed;
            }
        }

        result
    }

    async fn drive<E: PageEffects>(
        &mut self,
        spec: &PaginationSpec,
        effects: &mut E,
    ) -> Result<(), CrawlError> {
        if self.state != DriverState::Idle {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: DriverState::Scraping,
            });
        }

        match spec {
            PaginationSpec::None => {
                self.scrape(effects).await?;
                self.transition(DriverState::Done)
            }

            PaginationSpec::ScrollDown {
                scroll_count,
                scroll_interval,
            } => {
                let interval = Duration::from_millis(*scroll_interval);

                for round in 1..=*scroll_count {
                    self.scrape(effects).await?;

                    self.transition(DriverState::AwaitingAdvance)?;
                    effects.scroll_to_bottom().await?;
                    self.advances += 1;
                    tracing::debug!("Scroll {}/{}, waiting {:?}", round, scroll_count, interval);
                    effects.settle(interval).await?;
                }

                self.transition(DriverState::Done)
            }

            PaginationSpec::Click { next_page_selector } => loop {
                self.scrape(effects).await?;

                self.transition(DriverState::AwaitingAdvance)?;
                match effects
                    .click_next_page(next_page_selector, self.load_timeout)
                    .await?
                {
                    AdvanceOutcome::Exhausted => {
                        tracing::debug!("No control matches '{}'", next_page_selector);
                        return self.transition(DriverState::Done);
                    }
                    AdvanceOutcome::Loaded => {
                        self.advances += 1;
                        tracing::debug!("Page {} loaded", self.advances + 1);
                    }
                    AdvanceOutcome::TimedOut => {
                        self.advances += 1;
                        tracing::warn!(
                            "No load-complete within {:?}, scraping page {} anyway",
                            self.load_timeout,
                            self.advances + 1
                        );
                    }
                }
            },
        }
    }

    async fn scrape<E: PageEffects>(&mut self, effects: &mut E) -> Result<(), CrawlError> {
        self.transition(DriverState::Scraping)?;
        let count = effects.scrape_and_store().await?;
        self.pages_scraped += 1;
        tracing::debug!("Page {}: {} records", self.pages_scraped, count);
        Ok(())
    }

    fn transition(&mut self, next: DriverState) -> Result<(), CrawlError> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!("Driver {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}
