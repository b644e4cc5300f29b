//! Refresh outcomes and the status report of the scheduler

use crate::state::{CrawlPhase, CrawlSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// How the last refresh firing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Success,
    Failed,

    /// The firing found another refresh in progress and did nothing
    Skipped,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answer to a manual trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerResult {
    /// A refresh was started
    Scheduled,

    /// A refresh is already in progress; nothing was started
    AlreadyRunning,
}

impl TriggerResult {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Scheduled => "Manual refresh has been triggered",
            Self::AlreadyRunning => "Refresh is already in progress",
        }
    }
}

/// Mutable record kept by the scheduler between firings
#[derive(Debug, Clone, Default)]
pub(crate) struct RefreshStatus {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<RefreshOutcome>,
    pub pages_updated: usize,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub skipped_runs: u64,
}

impl RefreshStatus {
    /// Records the end of a refresh run
    ///
    /// A run that was cancelled counts as failed.
    pub fn record_run(&mut self, result: Result<CrawlSummary, String>, at: DateTime<Utc>) {
        self.last_run_at = Some(at);

        match result {
            Ok(summary) if summary.outcome == CrawlPhase::Completed => {
                self.last_outcome = Some(RefreshOutcome::Success);
                self.pages_updated = summary.pages_succeeded;
                self.last_error = None;
            }
            Ok(summary) => {
                self.last_outcome = Some(RefreshOutcome::Failed);
                self.pages_updated = summary.pages_succeeded;
                self.last_error = Some(format!("Refresh {}", summary.outcome));
            }
            Err(message) => {
                self.last_outcome = Some(RefreshOutcome::Failed);
                self.pages_updated = 0;
                self.last_error = Some(message);
            }
        }
    }

    pub fn record_skipped(&mut self) {
        self.last_outcome = Some(RefreshOutcome::Skipped);
        self.skipped_runs += 1;
    }
}

/// Point-in-time report of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the daily trigger loop is active
    pub scheduler_running: bool,
    pub refresh_in_progress: bool,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub next_scheduled_refresh_time: Option<DateTime<Utc>>,
    pub last_refresh_outcome: Option<RefreshOutcome>,
    pub pages_updated: usize,
    pub last_error: Option<String>,
    pub skipped_runs: u64,
}
