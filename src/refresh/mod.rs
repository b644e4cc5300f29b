//! Scheduled and manual incremental refreshes
//!
//! - `RefreshScheduler`: daily trigger loop plus manual trigger, single-flight
//! - `RefreshRunner`: the seam through which the scheduler runs a refresh
//! - `SchedulerStatus`: the status report, including the last outcome

mod scheduler;
mod status;

pub use scheduler::{next_run_after, RefreshScheduler};
pub use status::{RefreshOutcome, SchedulerStatus, TriggerResult};

use crate::crawler::Coordinator;
use crate::state::CrawlSummary;
use crate::IngestError;
use std::future::Future;

/// Something that can run one incremental refresh
pub trait RefreshRunner: Send + Sync + 'static {
    fn run_refresh(&self) -> impl Future<Output = Result<CrawlSummary, IngestError>> + Send;
}

impl RefreshRunner for Coordinator {
    fn run_refresh(&self) -> impl Future<Output = Result<CrawlSummary, IngestError>> + Send {
        self.refresh()
    }
}
