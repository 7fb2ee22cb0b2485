//! Control channel served by the orchestrating context
//!
//! Hosts send `startCrawl` and `paginationSelectorPicked` here. Each crawl is
//! run on its own task so that a second `startCrawl` arriving mid-crawl is
//! answered right away with `CrawlAlreadyRunning`.

use crate::config::SelectorSink;
use crate::crawler::{CrawlReport, Orchestrator};
use crate::messaging::events::EventBus;
use crate::messaging::protocol::{TargetEvent, TargetEventKind};
use crate::{ConfigError, CrawlError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONTROL_BUFFER: usize = 8;

/// Errors seen by a control channel caller
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Control channel closed")]
    Closed,

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Requests accepted by the control server
#[derive(Debug)]
pub enum ControlRequest {
    StartCrawl {
        reply: oneshot::Sender<Result<CrawlReport, CrawlError>>,
    },
    PaginationSelectorPicked {
        selector: String,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
}

impl ControlRequest {
    /// Message name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartCrawl { .. } => "startCrawl",
            Self::PaginationSelectorPicked { .. } => "paginationSelectorPicked",
        }
    }
}

/// Caller side of the control channel
#[derive(Debug, Clone)]
pub struct ControlChannel {
    sender: mpsc::Sender<ControlRequest>,
}

impl ControlChannel {
    /// Triggers a crawl and waits for its report
    pub async fn start_crawl(&self) -> Result<CrawlReport, ControlError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ControlRequest::StartCrawl { reply })
            .await
            .map_err(|_| ControlError::Closed)?;

        Ok(response.await.map_err(|_| ControlError::Closed)??)
    }

    /// Delivers a selector chosen with the pagination picker
    pub async fn pagination_selector_picked(
        &self,
        selector: impl Into<String>,
    ) -> Result<(), ControlError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ControlRequest::PaginationSelectorPicked {
                selector: selector.into(),
                reply,
            })
            .await
            .map_err(|_| ControlError::Closed)?;

        Ok(response.await.map_err(|_| ControlError::Closed)??)
    }
}

/// Spawns the control server
///
/// The server stops when `cancel` fires or every `ControlChannel` is dropped.
/// Crawls already running finish on their own tasks.
pub fn spawn_control_server(
    orchestrator: Arc<Orchestrator>,
    sink: Arc<dyn SelectorSink>,
    cancel: CancellationToken,
) -> (ControlChannel, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<ControlRequest>(CONTROL_BUFFER);

    let task = tokio::spawn(async move {
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = receiver.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            tracing::debug!("Control request: {}", request.name());
            match request {
                ControlRequest::StartCrawl { reply } => {
                    let orchestrator = orchestrator.clone();
                    tokio::spawn(async move {
                        let result = orchestrator.start_crawl().await;
                        let _ = reply.send(result);
                    });
                }
                ControlRequest::PaginationSelectorPicked { selector, reply } => {
                    let result = sink.pagination_selector_picked(&selector);
                    if let Err(e) = &result {
                        tracing::warn!("Rejected picked selector '{}': {}", selector, e);
                    }
                    let _ = reply.send(result);
                }
            }
        }

        tracing::debug!("Control server stopped");
    });

    (ControlChannel { sender }, task)
}

/// Forwards picker events from the target bus to the control channel
///
/// Cancelling the bridge stops it once the events already published have been
/// forwarded, so a host can pick, cancel and join to know the selector is
/// stored.
pub fn spawn_picker_bridge(
    events: &EventBus,
    control: ControlChannel,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut receiver = events.subscribe();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                event = receiver.recv() => event,
                _ = cancel.cancelled() => break,
            };

            match event {
                Ok(event) => forward_pick(event, &control).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Picker bridge lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return,
            }
        }

        loop {
            match receiver.try_recv() {
                Ok(event) => forward_pick(event, &control).await,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Picker bridge lagged, {} events skipped", skipped);
                }
                Err(_) => break,
            }
        }
        tracing::debug!("Picker bridge stopped");
    })
}

async fn forward_pick(event: TargetEvent, control: &ControlChannel) {
    if let TargetEventKind::PaginationSelectorPicked(selector) = event.kind {
        tracing::info!("{} picked '{}'", event.target, selector);
        if let Err(e) = control.pagination_selector_picked(selector).await {
            tracing::warn!("Picked selector not stored: {}", e);
        }
    }
}
