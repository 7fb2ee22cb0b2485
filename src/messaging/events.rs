//! Target event bus and the page-load wait primitive

use crate::messaging::protocol::{TargetEvent, TargetEventKind, TargetId};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

const EVENT_BUS_CAPACITY: usize = 64;

/// Broadcast bus for target events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TargetEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Publishes an event; events with no subscriber are dropped
    pub fn emit(&self, target: TargetId, kind: TargetEventKind) {
        tracing::trace!("{} event: {:?}", target, kind);
        let _ = self.sender.send(TargetEvent { target, kind });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TargetEvent> {
        self.sender.subscribe()
    }
}

/// How a load wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWaitOutcome {
    /// The target reported load-complete
    Loaded,

    /// The timeout elapsed first
    TimedOut,

    /// The target was closed or cancelled
    Cancelled,
}

/// One-shot wait for a target's load-complete event
///
/// Arm it before triggering the navigation so a fast load is not missed. The
/// subscription lives exactly as long as the waiter: it is released when
/// `wait` returns or when the waiter is dropped unused.
#[derive(Debug)]
pub struct LoadWaiter {
    target: TargetId,
    receiver: broadcast::Receiver<TargetEvent>,
}

impl LoadWaiter {
    pub fn arm(bus: &EventBus, target: TargetId) -> Self {
        Self {
            target,
            receiver: bus.subscribe(),
        }
    }

    /// Waits for load-complete, the timeout, or cancellation, whichever is first
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> LoadWaitOutcome {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return LoadWaitOutcome::Cancelled,
                _ = &mut deadline => return LoadWaitOutcome::TimedOut,
                event = self.receiver.recv() => match event {
                    Ok(event) if event.target == self.target => match event.kind {
                        TargetEventKind::LoadComplete => return LoadWaitOutcome::Loaded,
                        TargetEventKind::Closed => return LoadWaitOutcome::Cancelled,
                        _ => continue,
                    },
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("{} load waiter lagged, {} events skipped", self.target, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        // No more events can arrive; only the timer or cancellation remain
                        return tokio::select! {
                            _ = cancel.cancelled() => LoadWaitOutcome::Cancelled,
                            _ = &mut deadline => LoadWaitOutcome::TimedOut,
                        };
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: TargetId = TargetId(1);

    #[tokio::test(start_paused = true)]
    async fn test_load_complete_ends_wait() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);
        bus.emit(TARGET, TargetEventKind::LoadStarted);
        bus.emit(TARGET, TargetEventKind::LoadComplete);

        let start = tokio::time::Instant::now();
        let outcome = waiter
            .wait(Duration::from_secs(10), &CancellationToken::new())
            .await;

        assert_eq!(outcome, LoadWaitOutcome::Loaded);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_target_is_ignored() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);
        bus.emit(TargetId(2), TargetEventKind::LoadComplete);

        let outcome = waiter
            .wait(Duration::from_secs(10), &CancellationToken::new())
            .await;
        assert_eq!(outcome, LoadWaitOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);

        let start = tokio::time::Instant::now();
        let outcome = waiter
            .wait(Duration::from_secs(10), &CancellationToken::new())
            .await;

        assert_eq!(outcome, LoadWaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_wait() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let outcome = waiter.wait(Duration::from_secs(10), &cancel).await;
        assert_eq!(outcome, LoadWaitOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_event_ends_wait() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);
        bus.emit(TARGET, TargetEventKind::Closed);

        let outcome = waiter
            .wait(Duration::from_secs(10), &CancellationToken::new())
            .await;
        assert_eq!(outcome, LoadWaitOutcome::Cancelled);
    }

    #[test]
    fn test_waiter_releases_subscription() {
        let bus = EventBus::new();
        let waiter = LoadWaiter::arm(&bus, TARGET);
        assert_eq!(bus.sender.receiver_count(), 1);

        drop(waiter);
        assert_eq!(bus.sender.receiver_count(), 0);
    }
}
