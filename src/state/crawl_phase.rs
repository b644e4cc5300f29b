/// Lifecycle and mode definitions for crawl runs
use serde::Serialize;
use std::fmt;

/// Lifecycle of a crawl coordinator
///
/// `Idle -> Running -> {Completed, Aborted}`; a finished coordinator can
/// start another run, which moves it back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    /// No run has started yet
    Idle,

    /// A run is in progress
    Running,

    /// The last run drained its work or reached the page limit
    Completed,

    /// The last run was cancelled or hit a fatal storage error
    Aborted,
}

impl CrawlPhase {
    /// Returns true if this phase ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if moving from this phase to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        match (self, next) {
            (Self::Idle | Self::Completed | Self::Aborted, Self::Running) => true,
            (Self::Running, Self::Completed | Self::Aborted) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a run does with the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Start from the root URLs and follow in-scope links
    Full,

    /// Re-fetch every cached URL without discovering new ones
    Refresh,
}

impl CrawlMode {
    /// Returns true if pages found on fetched pages are added to the frontier
    pub fn discovers_links(&self) -> bool {
        matches!(self, Self::Full)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
