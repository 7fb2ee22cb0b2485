//! Document-backed page context
//!
//! A `DocumentPage` holds the HTML of the page a target currently shows.
//! Scraping and picking run against that snapshot. Clicking a control that is,
//! or sits inside, a hyperlink navigates the target: the next document is
//! fetched in the background and `LoadComplete` is published when it is in
//! place.

use crate::config::FieldSpec;
use crate::extract::{extract_from_html, Record};
use crate::messaging::{PageError, PageHandler, TargetEventKind, TargetId};
use crate::selector::resolve_first_match;
use crate::target::fetcher::fetch_document;
use crate::target::registry::TargetContext;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use url::Url;

/// The document a target currently displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: Url,
    pub html: String,
}

/// What clicking a matched element does
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClickAction {
    Navigate(Url),
    Inert,
}

#[derive(Debug)]
struct Inner {
    context: TargetContext,
    client: Client,
    snapshot: RwLock<PageSnapshot>,
    picking: AtomicBool,
    scrolls: AtomicU32,
}

/// Page handler backed by a fetched HTML document
#[derive(Debug, Clone)]
pub struct DocumentPage {
    inner: Arc<Inner>,
}

impl DocumentPage {
    /// Fetches `url` and publishes `LoadComplete` once it is loaded
    pub async fn open(context: TargetContext, client: Client, url: Url) -> Result<Self, PageError> {
        context.events.emit(context.id, TargetEventKind::LoadStarted);
        let document = fetch_document(&client, &url).await?;
        tracing::info!("{} loaded {}", context.id, document.final_url);

        let page = Self::from_html(context, client, document.final_url, document.html);
        page.inner
            .context
            .events
            .emit(page.id(), TargetEventKind::LoadComplete);
        Ok(page)
    }

    /// Wraps an already loaded document without publishing any event
    pub fn from_html(
        context: TargetContext,
        client: Client,
        url: Url,
        html: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                client,
                snapshot: RwLock::new(PageSnapshot {
                    url,
                    html: html.into(),
                }),
                picking: AtomicBool::new(false),
                scrolls: AtomicU32::new(0),
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.context.id
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.read_snapshot().clone()
    }

    pub fn current_url(&self) -> Url {
        self.read_snapshot().url.clone()
    }

    pub fn is_picking(&self) -> bool {
        self.inner.picking.load(Ordering::SeqCst)
    }

    /// Number of scroll-to-bottom requests received
    pub fn scroll_count(&self) -> u32 {
        self.inner.scrolls.load(Ordering::SeqCst)
    }

    /// Picks the first element matching `query` while in picking mode
    ///
    /// Publishes `PaginationSelectorPicked` with the element's structural
    /// selector and leaves picking mode. Returns `Ok(None)` and stays in
    /// picking mode when nothing matches.
    pub fn pick(&self, query: &str) -> Result<Option<String>, PageError> {
        if !self.is_picking() {
            return Err(PageError::NotPicking);
        }

        let picked = {
            let snapshot = self.read_snapshot();
            let document = Html::parse_document(&snapshot.html);
            resolve_first_match(&document, query).map_err(|message| {
                PageError::InvalidSelector {
                    selector: query.to_string(),
                    message,
                }
            })?
        };

        if let Some(selector) = &picked {
            tracing::info!("{} picked pagination control '{}'", self.id(), selector);
            self.inner.picking.store(false, Ordering::SeqCst);
            self.inner.context.events.emit(
                self.id(),
                TargetEventKind::PaginationSelectorPicked(selector.clone()),
            );
        }

        Ok(picked)
    }

    fn read_snapshot(&self) -> RwLockReadGuard<'_, PageSnapshot> {
        self.inner.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn scrape_snapshot(&self, fields: &[FieldSpec]) -> Result<Vec<Record>, PageError> {
        let snapshot = self.read_snapshot();
        Ok(extract_from_html(&snapshot.html, fields)?)
    }

    /// Finds what clicking the first match of `selector` would do
    fn find_click_action(&self, selector: &str) -> Result<Option<ClickAction>, PageError> {
        let parsed = Selector::parse(selector).map_err(|e| PageError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })?;

        let snapshot = self.read_snapshot();
        let document = Html::parse_document(&snapshot.html);
        let action = document
            .select(&parsed)
            .next()
            .map(|element| match link_target(element, &snapshot.url) {
                Some(url) => ClickAction::Navigate(url),
                None => ClickAction::Inert,
            });

        Ok(action)
    }

    /// Loads `url` in the background and replaces the snapshot
    fn navigate(&self, url: Url) {
        let inner = self.inner.clone();
        let id = self.id();
        inner.context.events.emit(id, TargetEventKind::LoadStarted);

        tokio::spawn(async move {
            let cancel = inner.context.cancel.clone();
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return,
                fetched = fetch_document(&inner.client, &url) => fetched,
            };

            let snapshot = match fetched {
                Ok(document) => {
                    tracing::debug!("{} navigated to {}", id, document.final_url);
                    PageSnapshot {
                        url: document.final_url,
                        html: document.html,
                    }
                }
                Err(e) => {
                    tracing::warn!("{} navigation to {} failed: {}", id, url, e);
                    PageSnapshot {
                        html: error_document(&e),
                        url,
                    }
                }
            };

            *inner.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
            inner.context.events.emit(id, TargetEventKind::LoadComplete);
        });
    }
}

#[async_trait]
impl PageHandler for DocumentPage {
    async fn scrape_current_page(&self, fields: &[FieldSpec]) -> Result<Vec<Record>, PageError> {
        let records = self.scrape_snapshot(fields)?;
        tracing::debug!("{} scraped {} records", self.id(), records.len());
        Ok(records)
    }

    async fn click_next_page(&self, selector: &str) -> Result<bool, PageError> {
        match self.find_click_action(selector)? {
            Some(ClickAction::Navigate(url)) => {
                tracing::debug!("{} clicked '{}', following {}", self.id(), selector, url);
                self.navigate(url);
                Ok(true)
            }
            Some(ClickAction::Inert) => {
                tracing::debug!("{} clicked '{}', no navigation", self.id(), selector);
                Ok(true)
            }
            None => {
                tracing::debug!("{} no element matches '{}'", self.id(), selector);
                Ok(false)
            }
        }
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        let scrolls = self.inner.scrolls.fetch_add(1, Ordering::SeqCst) + 1;
        // A static document has nothing more to load below the fold
        tracing::debug!("{} scrolled to bottom ({} times)", self.id(), scrolls);
        Ok(())
    }

    async fn start_pagination_picking(&self) -> Result<(), PageError> {
        self.inner.picking.store(true, Ordering::SeqCst);
        tracing::debug!("{} picking started", self.id());
        Ok(())
    }

    async fn stop_pagination_picking(&self) -> Result<(), PageError> {
        self.inner.picking.store(false, Ordering::SeqCst);
        tracing::debug!("{} picking stopped", self.id());
        Ok(())
    }
}

/// Resolves the link a click on `element` follows, if any
///
/// The element itself or its closest `a`/`area` ancestor must carry an
/// `href` that resolves to an http(s) URL other than a same-page fragment.
fn link_target(element: ElementRef, base: &Url) -> Option<Url> {
    let node = *element;
    let anchor = std::iter::once(node)
        .chain(node.ancestors())
        .filter_map(ElementRef::wrap)
        .find(|e| matches!(e.value().name(), "a" | "area") && e.value().attr("href").is_some())?;

    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn error_document(error: &PageError) -> String {
    format!(
        "<html><head><title>Navigation failed</title></head><body data-error=\"{}\"></body></html>",
        error.to_string().replace('&', "&amp;").replace('"', "&quot;")
    )
}
