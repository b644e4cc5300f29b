use crate::content::{IndexError, Indexer, Page};
use crate::storage::PageCache;
use std::time::{Duration, Instant};

/// Indexer that accepts every page and does nothing with it
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexer;

impl Indexer for NoopIndexer {
    fn index(&self, _page: &Page) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Indexer that records every indexing call in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIndexer;

impl Indexer for TracingIndexer {
    fn index(&self, page: &Page) -> Result<(), IndexError> {
        tracing::debug!(
            "Indexed {} ({} sections, category: {})",
            page.url,
            page.sections.len(),
            page.category.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}

/// Result of passing the whole cache to an indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexSummary {
    pub indexed: usize,
    pub failed: usize,
    pub duration: Duration,
}

/// Passes every cached page to `indexer`
///
/// A page the indexer rejects is logged and counted; the remaining pages
/// are still indexed.
pub fn reindex_cache(cache: &PageCache, indexer: &dyn Indexer) -> ReindexSummary {
    let started = Instant::now();
    let pages = cache.get_all();
    tracing::info!("Re-indexing {} cached pages", pages.len());

    let mut indexed = 0;
    let mut failed = 0;
    for page in &pages {
        match indexer.index(page) {
            Ok(()) => indexed += 1,
            Err(e) => {
                tracing::warn!("Failed to index {}: {}", page.url, e);
                failed += 1;
            }
        }
    }

    tracing::info!("Re-indexed {} pages, {} failed", indexed, failed);
    ReindexSummary {
        indexed,
        failed,
        duration: started.elapsed(),
    }
}
