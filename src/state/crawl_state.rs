use crate::state::{CrawlMode, CrawlPhase};
use crate::url::CanonicalUrl;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Maximum number of failed URLs kept for the run summary
pub const FAILED_SAMPLE_LIMIT: usize = 25;

/// A URL that could not be ingested, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUrl {
    pub url: CanonicalUrl,
    pub reason: String,
}

/// Per-run counters shared by all page tasks of one run
#[derive(Debug)]
pub struct CrawlState {
    mode: CrawlMode,
    started: Instant,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    discovered: AtomicUsize,
    index_errors: AtomicUsize,
    failed_sample: Mutex<Vec<FailedUrl>>,
}

impl CrawlState {
    pub fn new(mode: CrawlMode) -> Self {
        Self {
            mode,
            started: Instant::now(),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            discovered: AtomicUsize::new(0),
            index_errors: AtomicUsize::new(0),
            failed_sample: Mutex::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    /// Records a saved page and returns the new success count
    pub fn record_success(&self) -> usize {
        self.succeeded.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records a page that could not be fetched, parsed, or saved
    pub fn record_failure(&self, url: &CanonicalUrl, reason: impl Into<String>) {
        self.failed.fetch_add(1, Ordering::Relaxed);

        let mut sample = self
            .failed_sample
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sample.len() < FAILED_SAMPLE_LIMIT {
            sample.push(FailedUrl {
                url: url.clone(),
                reason: reason.into(),
            });
        }
    }

    /// Records a URL admitted to the frontier
    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_error(&self) {
        self.index_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn pages_failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Builds the final report of the run
    pub fn summarize(&self, outcome: CrawlPhase, pages_visited: usize) -> CrawlSummary {
        let failed_urls = self
            .failed_sample
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        CrawlSummary {
            mode: self.mode,
            outcome,
            pages_visited,
            pages_succeeded: self.succeeded.load(Ordering::Relaxed),
            pages_failed: self.failed.load(Ordering::Relaxed),
            pages_discovered: self.discovered.load(Ordering::Relaxed),
            index_errors: self.index_errors.load(Ordering::Relaxed),
            failed_urls,
            duration: self.started.elapsed(),
        }
    }
}

/// Result of one crawl or refresh run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub mode: CrawlMode,

    /// `Completed` or `Aborted`
    pub outcome: CrawlPhase,

    /// URLs taken from the frontier
    pub pages_visited: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,

    /// URLs admitted to the frontier, roots included
    pub pages_discovered: usize,
    pub index_errors: usize,

    /// Up to [`FAILED_SAMPLE_LIMIT`] failed URLs with reasons
    pub failed_urls: Vec<FailedUrl>,
    pub duration: Duration,
}

impl CrawlSummary {
    /// Pages fetched per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.pages_succeeded as f64 / secs
        } else {
            0.0
        }
    }
}
