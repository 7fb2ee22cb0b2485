//! Registry of open targets
//!
//! Tracks every browsing context, which one is active, and tears targets down
//! by cancelling their token.

use crate::messaging::{
    spawn_page_server, EventBus, PageChannel, PageHandler, TargetEventKind, TargetId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Identity and lifetime of a target, handed to its page handler
#[derive(Debug, Clone)]
pub struct TargetContext {
    pub id: TargetId,
    pub events: EventBus,
    pub cancel: CancellationToken,
}

/// Handle to an open target: its channel, event bus and teardown token
#[derive(Debug, Clone)]
pub struct TargetHandle {
    id: TargetId,
    channel: PageChannel,
    events: EventBus,
    cancel: CancellationToken,
}

impl TargetHandle {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn channel(&self) -> &PageChannel {
        &self.channel
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Cancelled when the target is closed
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Resolves the browsing context a crawl should run against
pub trait TargetProvider: Send + Sync {
    /// The current target at invocation time, if any
    fn active_target(&self) -> Option<TargetHandle>;
}

#[derive(Debug, Default)]
struct RegistryState {
    targets: HashMap<TargetId, TargetHandle>,
    active: Option<TargetId>,
}

/// All open targets sharing one event bus
#[derive(Debug, Default)]
pub struct TargetRegistry {
    events: EventBus,
    next_id: AtomicU64,
    state: Mutex<RegistryState>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocates the identity for a target that is about to be attached
    pub fn new_context(&self) -> TargetContext {
        let id = TargetId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        TargetContext {
            id,
            events: self.events.clone(),
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the page server for `handler` and makes the target active
    pub fn attach<H: PageHandler>(&self, context: TargetContext, handler: H) -> TargetHandle {
        let (channel, _task) = spawn_page_server(context.id, handler, context.cancel.clone());
        let handle = TargetHandle {
            id: context.id,
            channel,
            events: context.events,
            cancel: context.cancel,
        };

        let mut state = self.state();
        state.targets.insert(handle.id, handle.clone());
        state.active = Some(handle.id);
        tracing::debug!("{} attached and active", handle.id);

        handle
    }

    /// Allocates a context, builds the handler from it and attaches it
    pub fn open<H, F>(&self, build: F) -> TargetHandle
    where
        H: PageHandler,
        F: FnOnce(&TargetContext) -> H,
    {
        let context = self.new_context();
        let handler = build(&context);
        self.attach(context, handler)
    }

    /// Makes an open target the active one
    pub fn activate(&self, id: TargetId) -> bool {
        let mut state = self.state();
        if state.targets.contains_key(&id) {
            state.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Tears a target down, cancelling any call or wait addressed to it
    pub fn close(&self, id: TargetId) -> bool {
        let removed = {
            let mut state = self.state();
            if state.active == Some(id) {
                state.active = None;
            }
            state.targets.remove(&id)
        };

        match removed {
            Some(handle) => {
                handle.cancel.cancel();
                self.events.emit(id, TargetEventKind::Closed);
                tracing::debug!("{} closed", id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TargetId) -> Option<TargetHandle> {
        self.state().targets.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TargetProvider for TargetRegistry {
    fn active_target(&self) -> Option<TargetHandle> {
        let state = self.state();
        state.active.and_then(|id| state.targets.get(&id).cloned())
    }
}
