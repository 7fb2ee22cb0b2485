//! Per-crawl state
//!
//! A `CrawlSession` owns the result set of one crawl. `TargetEffects` binds a
//! session, the selected fields and a target together into the effects the
//! pagination driver issues.

use crate::config::FieldSpec;
use crate::crawler::pagination::{AdvanceOutcome, PageEffects};
use crate::extract::{Record, ResultSet};
use crate::messaging::{LoadWaitOutcome, LoadWaiter};
use crate::target::TargetHandle;
use crate::CrawlError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Records accumulated by one crawl
#[derive(Debug)]
pub struct CrawlSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    results: ResultSet,
}

impl Default for CrawlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlSession {
    /// Starts a session with an empty result set
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            results: ResultSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Appends one page's records in order; an empty page leaves the set as is
    pub fn store_page(&mut self, records: Vec<Record>) {
        if !records.is_empty() {
            self.results.append(records);
        }
    }

    pub fn into_results(self) -> ResultSet {
        self.results
    }
}

/// Pagination effects addressed to one target
pub struct TargetEffects<'a> {
    target: &'a TargetHandle,
    fields: &'a [FieldSpec],
    session: &'a mut CrawlSession,
}

impl<'a> TargetEffects<'a> {
    pub fn new(
        target: &'a TargetHandle,
        fields: &'a [FieldSpec],
        session: &'a mut CrawlSession,
    ) -> Self {
        Self {
            target,
            fields,
            session,
        }
    }
}

#[async_trait]
impl PageEffects for TargetEffects<'_> {
    async fn scrape_and_store(&mut self) -> Result<usize, CrawlError> {
        let records = self
            .target
            .channel()
            .scrape_current_page(self.fields)
            .await
            .map_err(|e| CrawlError::ExtractionFailed(e.to_string()))?;

        let count = records.len();
        self.session.store_page(records);
        Ok(count)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), CrawlError> {
        self.target
            .channel()
            .scroll_to_bottom()
            .await
            .map_err(|e| CrawlError::AdvanceFailed(e.to_string()))
    }

    async fn settle(&mut self, interval: Duration) -> Result<(), CrawlError> {
        tokio::select! {
            _ = self.target.cancel_token().cancelled() => Err(CrawlError::AdvanceFailed(format!(
                "{} closed while waiting for scrolled content",
                self.target.id()
            ))),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }

    async fn click_next_page(
        &mut self,
        selector: &str,
        load_timeout: Duration,
    ) -> Result<AdvanceOutcome, CrawlError> {
        // Subscribe before clicking so a fast load-complete is not missed
        let waiter = LoadWaiter::arm(self.target.events(), self.target.id());

        let clicked = self
            .target
            .channel()
            .click_next_page(selector)
            .await
            .map_err(|e| CrawlError::AdvanceFailed(e.to_string()))?;

        if !clicked {
            return Ok(AdvanceOutcome::Exhausted);
        }

        match waiter.wait(load_timeout, self.target.cancel_token()).await {
            LoadWaitOutcome::Loaded => Ok(AdvanceOutcome::Loaded),
            LoadWaitOutcome::TimedOut => Ok(AdvanceOutcome::TimedOut),
            LoadWaitOutcome::Cancelled => Err(CrawlError::AdvanceFailed(format!(
                "{} closed while waiting for page load",
                self.target.id()
            ))),
        }
    }
}
