//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: lifecycle of a coordinator (idle, running, completed, aborted)
//! - `CrawlMode`: full crawl or incremental refresh
//! - `CrawlState`: per-run counters and the bounded failed-URL sample
//! - `CrawlSummary`: the report a run returns

mod crawl_phase;
mod crawl_state;

// Re-export main types
pub use crawl_phase::{CrawlMode, CrawlPhase};
pub use crawl_state::{CrawlState, CrawlSummary, FailedUrl, FAILED_SAMPLE_LIMIT};
