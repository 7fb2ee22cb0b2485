/// Pagination driver states
///
/// This module defines the states a crawl moves through while paginating.
use serde::Serialize;
use std::fmt;

/// Represents the current state of the pagination driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    // ===== Active States =====
    /// Driver has not started yet
    Idle,

    /// A scrape request is in flight
    Scraping,

    /// An advance (scroll or click) is in flight or its wait is running
    AwaitingAdvance,

    // ===== Terminal States =====
    /// Pagination ended normally
    Done,

    /// A scrape or advance failed; accumulated records are kept
    Failed,
}

impl DriverState {
    /// Returns true if this is a terminal state (no further steps run)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the driver may move from this state to `next`
    ///
    /// `Idle -> Done` covers a scroll strategy with a count of zero. Any
    /// active state may fail.
    pub fn can_transition_to(&self, next: DriverState) -> bool {
        use DriverState::*;

        match (self, next) {
            (Idle, Scraping) | (Idle, Done) => true,
            (Scraping, AwaitingAdvance) | (Scraping, Done) => true,
            (AwaitingAdvance, Scraping) | (AwaitingAdvance, Done) => true,
            (Idle | Scraping | AwaitingAdvance, Failed) => true,
            _ => false,
        }
    }

    /// Converts the state to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scraping => "scraping",
            Self::AwaitingAdvance => "awaiting_advance",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible driver states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Scraping,
            Self::AwaitingAdvance,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::Idle
    }
}
