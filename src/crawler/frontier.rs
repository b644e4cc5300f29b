//! Crawl frontier
//!
//! The frontier owns the FIFO queue of URLs waiting to be visited together
//! with the queued and visited sets of one run. A URL is admitted at most
//! once per frontier, so every reachable page is fetched at most once.

use crate::url::CanonicalUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CanonicalUrl>,
    queued: HashSet<CanonicalUrl>,
    visited: HashSet<CanonicalUrl>,
}

/// Dedup-aware work queue for a single crawl run
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier holding `urls`, in order, duplicates dropped
    pub fn seeded(urls: impl IntoIterator<Item = CanonicalUrl>) -> Self {
        let frontier = Self::new();
        for url in urls {
            frontier.enqueue(url);
        }
        frontier
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a URL unless it is already queued or visited
    ///
    /// Returns true if the URL was admitted.
    pub fn enqueue(&self, url: CanonicalUrl) -> bool {
        let mut inner = self.lock();
        if inner.visited.contains(&url) || inner.queued.contains(&url) {
            return false;
        }
        inner.queued.insert(url.clone());
        inner.queue.push_back(url);
        true
    }

    /// Removes the oldest queued URL
    ///
    /// The URL is not marked visited; callers that need both in one step use
    /// [`Frontier::next_to_visit`].
    pub fn dequeue(&self) -> Option<CanonicalUrl> {
        let mut inner = self.lock();
        let url = inner.queue.pop_front()?;
        inner.queued.remove(&url);
        Some(url)
    }

    /// Records that work on `url` has started
    ///
    /// Returns false if it was already visited.
    pub fn mark_visited(&self, url: &CanonicalUrl) -> bool {
        self.lock().visited.insert(url.clone())
    }

    /// Dequeues the oldest URL and marks it visited under one lock
    ///
    /// Queued URLs that were marked visited in the meantime (for example as
    /// a redirect target) are dropped.
    pub fn next_to_visit(&self) -> Option<CanonicalUrl> {
        let mut inner = self.lock();
        while let Some(url) = inner.queue.pop_front() {
            inner.queued.remove(&url);
            if inner.visited.insert(url.clone()) {
                return Some(url);
            }
        }
        None
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.lock().visited.contains(url)
    }

    /// Number of URLs waiting to be visited
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }
}
