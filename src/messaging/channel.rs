//! Request/response channel into a page context
//!
//! Each target runs a page server task that owns a `PageHandler` and answers
//! requests one at a time. The orchestrating side holds a cloneable
//! `PageChannel`; every call carries its own `oneshot` reply slot, so replies
//! are paired with requests regardless of scheduling order.

use crate::config::FieldSpec;
use crate::extract::{ExtractError, Record};
use crate::messaging::protocol::{PageRequest, PageResponse, TargetId};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REQUEST_BUFFER: usize = 16;

/// Errors raised inside a page context
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Expected HTML from {url}, got '{content_type}'")]
    NotHtml { url: String, content_type: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not in picking mode")]
    NotPicking,
}

/// Errors seen by the caller of a page channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0} is closed")]
    TargetClosed(TargetId),

    #[error("{request} failed in page: {source}")]
    Page {
        request: &'static str,
        source: PageError,
    },

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

/// Page-side handler for the messages of a target
///
/// Implemented by `DocumentPage` and by test doubles.
#[async_trait]
pub trait PageHandler: Send + Sync + 'static {
    async fn scrape_current_page(&self, fields: &[FieldSpec]) -> Result<Vec<Record>, PageError>;

    /// Returns whether a matching control existed and was clicked
    async fn click_next_page(&self, selector: &str) -> Result<bool, PageError>;

    async fn scroll_to_bottom(&self) -> Result<(), PageError>;

    async fn start_pagination_picking(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn stop_pagination_picking(&self) -> Result<(), PageError> {
        Ok(())
    }
}

type Reply = oneshot::Sender<Result<PageResponse, PageError>>;

#[derive(Debug)]
struct Envelope {
    request: PageRequest,
    reply: Option<Reply>,
}

/// Caller side of a target's message channel
#[derive(Debug, Clone)]
pub struct PageChannel {
    target: TargetId,
    sender: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl PageChannel {
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Sends a request and waits for its reply
    ///
    /// Fails with `TargetClosed` if the target is torn down before replying.
    pub async fn call(&self, request: PageRequest) -> Result<PageResponse, ChannelError> {
        let name = request.name();
        let (reply, response) = oneshot::channel();
        self.send(Envelope {
            request,
            reply: Some(reply),
        })
        .await?;

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ChannelError::TargetClosed(self.target)),
            result = response => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(source)) => Err(ChannelError::Page { request: name, source }),
                Err(_) => Err(ChannelError::TargetClosed(self.target)),
            },
        }
    }

    /// Sends a request without waiting for it to be handled
    pub async fn notify(&self, request: PageRequest) -> Result<(), ChannelError> {
        self.send(Envelope {
            request,
            reply: None,
        })
        .await
    }

    async fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ChannelError::TargetClosed(self.target)),
            sent = self.sender.send(envelope) => {
                sent.map_err(|_| ChannelError::TargetClosed(self.target))
            }
        }
    }

    pub async fn scrape_current_page(
        &self,
        fields: &[FieldSpec],
    ) -> Result<Vec<Record>, ChannelError> {
        match self
            .call(PageRequest::ScrapeCurrentPage(fields.to_vec()))
            .await?
        {
            PageResponse::Records(records) => Ok(records),
            _ => Err(ChannelError::UnexpectedResponse("scrapeCurrentPage")),
        }
    }

    pub async fn click_next_page(&self, selector: &str) -> Result<bool, ChannelError> {
        match self
            .call(PageRequest::ClickNextPage(selector.to_string()))
            .await?
        {
            PageResponse::Clicked(clicked) => Ok(clicked),
            _ => Err(ChannelError::UnexpectedResponse("clickNextPage")),
        }
    }

    /// Fire-and-forget scroll to the bottom of the page
    pub async fn scroll_to_bottom(&self) -> Result<(), ChannelError> {
        self.notify(PageRequest::ScrollToBottom).await
    }

    pub async fn start_pagination_picking(&self) -> Result<(), ChannelError> {
        self.call(PageRequest::StartPaginationPicking).await.map(|_| ())
    }

    pub async fn stop_pagination_picking(&self) -> Result<(), ChannelError> {
        self.call(PageRequest::StopPaginationPicking).await.map(|_| ())
    }
}

/// Spawns the page server task for a handler
///
/// The task stops when `cancel` fires or when every `PageChannel` is dropped.
pub fn spawn_page_server<H: PageHandler>(
    target: TargetId,
    handler: H,
    cancel: CancellationToken,
) -> (PageChannel, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
    let channel = PageChannel {
        target,
        sender,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(serve(target, handler, receiver, cancel));
    (channel, task)
}

async fn serve<H: PageHandler>(
    target: TargetId,
    handler: H,
    mut receiver: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) {
    tracing::debug!("{} page server started", target);

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = receiver.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let name = envelope.request.name();
        tracing::trace!("{} handling {}", target, name);

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = dispatch(&handler, envelope.request) => result,
        };

        match envelope.reply {
            Some(reply) => {
                // The caller may have given up waiting
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    tracing::warn!("{} {} failed: {}", target, name, e);
                }
            }
        }
    }

    tracing::debug!("{} page server stopped", target);
}

async fn dispatch<H: PageHandler>(
    handler: &H,
    request: PageRequest,
) -> Result<PageResponse, PageError> {
    match request {
        PageRequest::ScrapeCurrentPage(fields) => handler
            .scrape_current_page(&fields)
            .await
            .map(PageResponse::Records),
        PageRequest::ClickNextPage(selector) => handler
            .click_next_page(&selector)
            .await
            .map(PageResponse::Clicked),
        PageRequest::ScrollToBottom => handler.scroll_to_bottom().await.map(|_| PageResponse::Ack),
        PageRequest::StartPaginationPicking => handler
            .start_pagination_picking()
            .await
            .map(|_| PageResponse::Ack),
        PageRequest::StopPaginationPicking => handler
            .stop_pagination_picking()
            .await
            .map(|_| PageResponse::Ack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct EchoPage {
        scrolls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PageHandler for EchoPage {
        async fn scrape_current_page(
            &self,
            fields: &[FieldSpec],
        ) -> Result<Vec<Record>, PageError> {
            if fields.is_empty() {
                return Err(ExtractError::EmptyFieldList.into());
            }
            Ok(vec![fields
                .iter()
                .map(|f| (f.name.clone(), Some(f.selector.clone())))
                .collect()])
        }

        async fn click_next_page(&self, selector: &str) -> Result<bool, PageError> {
            Ok(selector == "a.next")
        }

        async fn scroll_to_bottom(&self) -> Result<(), PageError> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct HangingPage;

    #[async_trait]
    impl PageHandler for HangingPage {
        async fn scrape_current_page(&self, _: &[FieldSpec]) -> Result<Vec<Record>, PageError> {
            std::future::pending().await
        }

        async fn click_next_page(&self, _: &str) -> Result<bool, PageError> {
            std::future::pending().await
        }

        async fn scroll_to_bottom(&self) -> Result<(), PageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_call_returns_reply() {
        let (channel, _task) =
            spawn_page_server(TargetId(1), EchoPage::default(), CancellationToken::new());

        let records = channel
            .scrape_current_page(&[FieldSpec::new("title", "h1")])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("title"), Some(Some("h1")));

        assert!(channel.click_next_page("a.next").await.unwrap());
        assert!(!channel.click_next_page("a.prev").await.unwrap());
    }

    #[tokio::test]
    async fn test_page_error_is_reported() {
        let (channel, _task) =
            spawn_page_server(TargetId(1), EchoPage::default(), CancellationToken::new());

        let err = channel.scrape_current_page(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Page {
                request: "scrapeCurrentPage",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_notify_is_handled_in_order() {
        let page = EchoPage::default();
        let scrolls = page.scrolls.clone();
        let (channel, _task) = spawn_page_server(TargetId(1), page, CancellationToken::new());

        channel.scroll_to_bottom().await.unwrap();
        channel.scroll_to_bottom().await.unwrap();
        // Requests are served in order, so this reply implies both scrolls ran
        channel.click_next_page("a.next").await.unwrap();

        assert_eq!(scrolls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_fails_outstanding_call() {
        let cancel = CancellationToken::new();
        let (channel, task) = spawn_page_server(TargetId(3), HangingPage, cancel.clone());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = channel.click_next_page("a").await.unwrap_err();
        assert!(matches!(err, ChannelError::TargetClosed(TargetId(3))));

        task.await.unwrap();
        assert!(matches!(
            channel.scrape_current_page(&[]).await,
            Err(ChannelError::TargetClosed(_))
        ));
    }
}
