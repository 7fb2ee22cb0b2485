//! Cross-context messaging
//!
//! Three surfaces connect the orchestrating context with page contexts:
//! - the page channel (`PageRequest` calls answered by a `PageHandler`)
//! - the target event bus (load and picker events, scoped by `TargetId`)
//! - the control channel (`startCrawl` and `paginationSelectorPicked`)

mod channel;
mod control;
mod events;
mod protocol;

pub use channel::{spawn_page_server, ChannelError, PageChannel, PageError, PageHandler};
pub use control::{
    spawn_control_server, spawn_picker_bridge, ControlChannel, ControlError, ControlRequest,
};
pub use events::{EventBus, LoadWaitOutcome, LoadWaiter};
pub use protocol::{PageRequest, PageResponse, TargetEvent, TargetEventKind, TargetId};
