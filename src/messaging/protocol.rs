//! Message types exchanged with page contexts

use crate::config::FieldSpec;
use crate::extract::Record;
use serde::Serialize;
use std::fmt;

/// Identifies one browsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Requests the orchestrating side sends into a page context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Extract records from the current page state
    ScrapeCurrentPage(Vec<FieldSpec>),

    /// Click the first element matching the selector
    ClickNextPage(String),

    /// Scroll to the bottom of the page; sent without awaiting a reply
    ScrollToBottom,

    /// Enter element-picking mode
    StartPaginationPicking,

    /// Leave element-picking mode
    StopPaginationPicking,
}

impl PageRequest {
    /// Message name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScrapeCurrentPage(_) => "scrapeCurrentPage",
            Self::ClickNextPage(_) => "clickNextPage",
            Self::ScrollToBottom => "scrollToBottom",
            Self::StartPaginationPicking => "startPaginationPicking",
            Self::StopPaginationPicking => "stopPaginationPicking",
        }
    }
}

/// Replies from a page context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResponse {
    Records(Vec<Record>),
    Clicked(bool),
    Ack,
}

/// Kinds of events a target publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEventKind {
    /// Navigation to a new document began
    LoadStarted,

    /// The current document finished loading
    LoadComplete,

    /// The user picked an element while in picking mode
    PaginationSelectorPicked(String),

    /// The target was torn down
    Closed,
}

/// An event scoped to one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEvent {
    pub target: TargetId,
    pub kind: TargetEventKind,
}
