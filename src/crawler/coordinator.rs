//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the frontier, fetcher,
//! parser, page cache, and indexer together:
//! - Seeding the frontier (root URLs and sitemap entries for a full crawl,
//!   cached URLs for a refresh)
//! - Keeping up to the concurrency cap of pages in flight
//! - Feeding in-scope links back into the frontier during a full crawl
//! - Enforcing the full-crawl page limit and handling cancellation

use crate::config::Config;
use crate::content::{HtmlPageParser, Indexer, NoopIndexer, PageParser, ParseError};
use crate::crawler::fetcher::{FetchedBody, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::links::extract_links;
use crate::crawler::sitemap::extract_sitemap_urls;
use crate::state::{CrawlMode, CrawlPhase, CrawlState, CrawlSummary};
use crate::storage::{PageCache, StorageError};
use crate::url::{CanonicalUrl, UrlPolicy};
use crate::IngestError;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

/// Main crawler coordinator structure
///
/// One coordinator runs at most one crawl or refresh at a time; starting a
/// second run while one is in progress fails with
/// [`IngestError::AlreadyRunning`].
pub struct Coordinator {
    roots: Vec<CanonicalUrl>,
    sitemap: Option<CanonicalUrl>,
    max_pages: Option<usize>,
    grace: Duration,
    policy: Arc<UrlPolicy>,
    fetcher: Arc<Fetcher>,
    parser: Arc<dyn PageParser>,
    indexer: Arc<dyn Indexer>,
    cache: Arc<PageCache>,
    phase: Mutex<CrawlPhase>,
    cancel: watch::Sender<bool>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Uses [`HtmlPageParser`] and [`NoopIndexer`] until replaced with
    /// [`Coordinator::with_parser`] and [`Coordinator::with_indexer`].
    pub fn new(config: &Config, cache: Arc<PageCache>) -> Result<Self, IngestError> {
        let roots = config
            .crawler
            .root_urls
            .iter()
            .map(|raw| CanonicalUrl::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let sitemap = config
            .crawler
            .sitemap_url
            .as_deref()
            .map(CanonicalUrl::parse)
            .transpose()?;

        let fetcher = Fetcher::new(&config.crawler, &config.user_agent)?;
        let parser = HtmlPageParser::new(&config.scope.base_path)?;
        let (cancel, _) = watch::channel(false);

        Ok(Self {
            roots,
            sitemap,
            max_pages: config.crawler.max_pages,
            grace: Duration::from_secs(config.crawler.shutdown_grace_secs),
            policy: Arc::new(UrlPolicy::from_config(&config.scope)),
            fetcher: Arc::new(fetcher),
            parser: Arc::new(parser),
            indexer: Arc::new(NoopIndexer),
            cache,
            phase: Mutex::new(CrawlPhase::Idle),
            cancel,
        })
    }

    /// Replaces the page parser
    pub fn with_parser(mut self, parser: Arc<dyn PageParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the indexer
    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = indexer;
        self
    }

    /// Overrides the configured full-crawl page limit
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Overrides how long a cancelled run waits for in-flight pages
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests cancellation of the current run
    ///
    /// No new pages are dispatched once the request is observed; pages in
    /// flight get the grace period to finish.
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Runs a full crawl from the root URLs and the sitemap, when configured
    ///
    /// Follows in-scope links until the frontier drains, the page limit is
    /// reached, or the run is cancelled. The cache's last-full-crawl stamp
    /// is updated when the run ends.
    pub async fn crawl(&self) -> Result<CrawlSummary, IngestError> {
        self.begin()?;

        tracing::info!("Starting full crawl from {} root URLs", self.roots.len());
        let mut seeds = self.roots.clone();
        seeds.extend(self.sitemap_seeds().await);

        let result = self
            .run(CrawlMode::Full, seeds)
            .await
            .and_then(|summary| {
                self.cache.mark_full_crawl(Utc::now())?;
                Ok(summary)
            });

        self.finish(&result);
        result
    }

    /// Re-fetches every cached page without discovering new ones
    ///
    /// The page limit does not apply. Pages that fail to fetch or parse keep
    /// their cached copy.
    pub async fn refresh(&self) -> Result<CrawlSummary, IngestError> {
        self.begin()?;

        let urls = self.cache.urls();
        tracing::info!("Starting incremental refresh of {} cached pages", urls.len());
        let result = self.run(CrawlMode::Refresh, urls).await;

        self.finish(&result);
        result
    }

    /// In-scope URLs listed in the configured sitemap
    ///
    /// A sitemap that cannot be fetched is logged and contributes nothing;
    /// the crawl still starts from the roots.
    async fn sitemap_seeds(&self) -> Vec<CanonicalUrl> {
        let sitemap = match &self.sitemap {
            Some(sitemap) => sitemap,
            None => return Vec::new(),
        };

        tracing::info!("Fetching sitemap from {}", sitemap);
        let fetched = match self.fetcher.fetch(sitemap).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!("Failed to fetch sitemap: {}", e);
                return Vec::new();
            }
        };

        let listed = extract_sitemap_urls(&String::from_utf8_lossy(&fetched.body));
        let seeds: Vec<CanonicalUrl> = listed
            .iter()
            .filter_map(|url| CanonicalUrl::from_url(url).ok())
            .filter(|url| self.policy.admits(url))
            .collect();

        tracing::info!(
            "Found {} URLs in sitemap, {} in scope",
            listed.len(),
            seeds.len()
        );
        seeds
    }

    fn begin(&self) -> Result<(), IngestError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.can_transition_to(CrawlPhase::Running) {
            return Err(IngestError::AlreadyRunning);
        }
        *phase = CrawlPhase::Running;
        self.cancel.send_replace(false);
        Ok(())
    }

    fn finish(&self, result: &Result<CrawlSummary, IngestError>) {
        let next = match result {
            Ok(summary) => summary.outcome,
            Err(_) => CrawlPhase::Aborted,
        };
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn page_task(&self, frontier: Option<Arc<Frontier>>, state: &Arc<CrawlState>) -> PageTask {
        PageTask {
            fetcher: Arc::clone(&self.fetcher),
            parser: Arc::clone(&self.parser),
            indexer: Arc::clone(&self.indexer),
            cache: Arc::clone(&self.cache),
            policy: Arc::clone(&self.policy),
            frontier,
            state: Arc::clone(state),
        }
    }

    /// Runs the crawl loop over a frontier seeded with `seeds`
    async fn run(
        &self,
        mode: CrawlMode,
        seeds: Vec<CanonicalUrl>,
    ) -> Result<CrawlSummary, IngestError> {
        let state = Arc::new(CrawlState::new(mode));
        let frontier = Arc::new(Frontier::new());
        for url in seeds {
            if frontier.enqueue(url) {
                state.record_discovered();
            }
        }

        let discovery = mode.discovers_links().then(|| Arc::clone(&frontier));
        let limit = match mode {
            CrawlMode::Full => self.max_pages.unwrap_or(usize::MAX),
            CrawlMode::Refresh => usize::MAX,
        };
        let cap = self.fetcher.max_in_flight();
        let mut cancel_rx = self.cancel.subscribe();

        let mut tasks: JoinSet<Result<(), StorageError>> = JoinSet::new();
        let mut visited = 0usize;
        let mut fatal: Option<StorageError> = None;
        let mut cancelled = false;
        let mut limit_logged = false;

        loop {
            let cancel_requested = *cancel_rx.borrow();
            if cancel_requested {
                cancelled = true;
                break;
            }
            if fatal.is_some() {
                break;
            }

            if tasks.len() < cap && visited < limit {
                if let Some(url) = frontier.next_to_visit() {
                    visited += 1;
                    let task = self.page_task(discovery.clone(), &state);
                    tasks.spawn(task.run(url));
                    continue;
                }
            }

            if visited >= limit && !limit_logged {
                tracing::info!("Page limit of {} reached", limit);
                limit_logged = true;
            }

            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(result) => absorb(result, &mut fatal),
                    None => break,
                },
                _ = cancel_rx.changed() => {}
            }
        }

        if !tasks.is_empty() {
            tracing::info!(
                "Waiting up to {:?} for {} in-flight pages",
                self.grace,
                tasks.len()
            );
            let drained = tokio::time::timeout(self.grace, async {
                while let Some(result) = tasks.join_next().await {
                    absorb(result, &mut fatal);
                }
            })
            .await;

            if drained.is_err() {
                tracing::warn!(
                    "{} pages still in flight after the grace period; leaving them to finish",
                    tasks.len()
                );
                tasks.detach_all();
            }
        }

        if let Some(error) = fatal {
            tracing::error!("Aborting {} run: {}", mode, error);
            return Err(error.into());
        }

        let outcome = if cancelled {
            CrawlPhase::Aborted
        } else {
            CrawlPhase::Completed
        };
        let summary = state.summarize(outcome, visited);

        tracing::info!(
            "{} run {}: {} pages saved, {} failed, {} discovered in {:?}",
            mode,
            outcome,
            summary.pages_succeeded,
            summary.pages_failed,
            summary.pages_discovered,
            summary.duration
        );
        if !summary.failed_urls.is_empty() {
            let sample: Vec<&str> = summary
                .failed_urls
                .iter()
                .take(10)
                .map(|failed| failed.url.as_str())
                .collect();
            tracing::warn!("Failed URLs (first {}): {:?}", sample.len(), sample);
        }

        Ok(summary)
    }
}

/// Folds a finished page task into the run's fatal-error slot
fn absorb(result: Result<Result<(), StorageError>, JoinError>, fatal: &mut Option<StorageError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            if fatal.is_none() {
                *fatal = Some(error);
            }
        }
        Err(error) => tracing::error!("Page task panicked: {}", error),
    }
}

/// Everything one page needs, detached from the coordinator's lifetime
struct PageTask {
    fetcher: Arc<Fetcher>,
    parser: Arc<dyn PageParser>,
    indexer: Arc<dyn Indexer>,
    cache: Arc<PageCache>,
    policy: Arc<UrlPolicy>,
    frontier: Option<Arc<Frontier>>,
    state: Arc<CrawlState>,
}

impl PageTask {
    /// Fetches, parses, saves, and indexes one URL, in that order
    ///
    /// Every per-page failure is recorded in the run state; only a failure
    /// to write the cache index record is returned.
    async fn run(self, url: CanonicalUrl) -> Result<(), StorageError> {
        tracing::debug!("Processing URL: {}", url);

        let fetched = match self.fetcher.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                self.state.record_failure(&url, e.to_string());
                return Ok(());
            }
        };

        if !fetched.is_html() {
            tracing::warn!(
                "Skipping {}: unsupported content type '{}'",
                url,
                fetched.content_type
            );
            let error = ParseError::UnsupportedContentType(fetched.content_type);
            self.state.record_failure(&url, error.to_string());
            return Ok(());
        }

        if let Some(frontier) = &self.frontier {
            if !self.claim_redirect_target(frontier, &url, &fetched) {
                return Ok(());
            }
            self.enqueue_links(frontier, &fetched);
        }

        let page = match self.parser.parse(&fetched.body, &url) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", url, e);
                self.state.record_failure(&url, e.to_string());
                return Ok(());
            }
        };

        match self.cache.save(&page) {
            Ok(()) => {}
            Err(e @ StorageError::IndexRecord(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to save {}: {}", url, e);
                self.state.record_failure(&url, e.to_string());
                return Ok(());
            }
        }

        let saved = self.state.record_success();
        if saved % 10 == 0 {
            let elapsed = self.state.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                saved as f64 / elapsed
            } else {
                0.0
            };
            tracing::info!(
                "Progress: {} pages saved, {} failed, {} in frontier, {:.2} pages/sec",
                saved,
                self.state.pages_failed(),
                self.frontier.as_ref().map_or(0, |f| f.pending()),
                rate
            );
        }

        if let Err(e) = self.indexer.index(&page) {
            tracing::warn!("Failed to index {}: {}", url, e);
            self.state.record_index_error();
        }

        Ok(())
    }

    /// Marks the target of a followed redirect as visited
    ///
    /// The page is still stored under the requested URL. Returns false when
    /// the target was already visited, in which case that visit owns the
    /// page and this one is dropped.
    fn claim_redirect_target(
        &self,
        frontier: &Frontier,
        url: &CanonicalUrl,
        fetched: &FetchedBody,
    ) -> bool {
        let target = match CanonicalUrl::from_url(&fetched.final_url) {
            Ok(target) if &target != url => target,
            _ => return true,
        };

        if frontier.mark_visited(&target) {
            tracing::debug!("{} redirected to {}", url, target);
            true
        } else {
            tracing::debug!(
                "{} redirected to already visited {}; not storing a second copy",
                url,
                target
            );
            false
        }
    }

    /// Admits every in-scope link of the fetched page to the frontier
    fn enqueue_links(&self, frontier: &Frontier, fetched: &FetchedBody) {
        let html = String::from_utf8_lossy(&fetched.body);
        for link in extract_links(&html, &fetched.final_url) {
            let canonical = match CanonicalUrl::from_url(&link) {
                Ok(canonical) => canonical,
                Err(_) => continue,
            };

            if self.policy.admits(&canonical) && frontier.enqueue(canonical) {
                self.state.record_discovered();
            }
        }
    }
}
