//! Page cache with category index
//!
//! The cache keeps every page in memory and writes through to a
//! [`Storage`] backend. Reads never touch the backend.

use crate::content::Page;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CacheStats, IndexRecord, PageRow, SqliteStorage};
use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct CacheState {
    pages: BTreeMap<CanonicalUrl, Page>,
    categories: BTreeMap<String, BTreeSet<CanonicalUrl>>,
    last_full_crawl: Option<DateTime<Utc>>,
}

impl CacheState {
    /// Inserts or replaces a page, moving it between category buckets
    fn insert(&mut self, page: Page) {
        if let Some(previous) = self.pages.get(&page.url) {
            if previous.category != page.category {
                if let Some(old) = previous.category.clone() {
                    self.remove_from_bucket(&old, &page.url);
                }
            }
        }

        if let Some(category) = &page.category {
            self.categories
                .entry(category.clone())
                .or_default()
                .insert(page.url.clone());
        }

        self.pages.insert(page.url.clone(), page);
    }

    fn remove_from_bucket(&mut self, category: &str, url: &CanonicalUrl) {
        if let Some(bucket) = self.categories.get_mut(category) {
            bucket.remove(url);
            if bucket.is_empty() {
                self.categories.remove(category);
            }
        }
    }

    fn index_record(&self) -> IndexRecord {
        IndexRecord {
            total_pages: self.pages.len(),
            categories: self
                .categories
                .iter()
                .map(|(name, urls)| (name.clone(), urls.len()))
                .collect(),
            last_full_crawl: self.last_full_crawl,
        }
    }
}

/// Durable cache of pages keyed by canonical URL
pub struct PageCache {
    store: Mutex<Box<dyn Storage>>,
    state: RwLock<CacheState>,
    skipped_records: usize,
}

impl PageCache {
    /// Opens the SQLite-backed cache at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_storage(Box::new(SqliteStorage::new(path)?))
    }

    /// Creates an empty cache backed by an in-memory database
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_storage(Box::new(SqliteStorage::new_in_memory()?))
    }

    /// Loads the cache from an existing backend
    ///
    /// Rows that cannot be read are skipped and logged. The index record is
    /// rebuilt from the loaded pages when it is missing, unreadable, or
    /// disagrees with them.
    pub fn with_storage(mut store: Box<dyn Storage>) -> StorageResult<Self> {
        let mut state = CacheState::default();
        let mut skipped_records = 0;

        for row in store.load_pages()? {
            match serde_json::from_str::<Page>(&row.record) {
                Ok(page) if page.url.as_str() == row.url => state.insert(page),
                Ok(page) => {
                    tracing::warn!(
                        "Skipping cache record for {}: record belongs to {}",
                        row.url,
                        page.url
                    );
                    skipped_records += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable cache record for {}: {}", row.url, e);
                    skipped_records += 1;
                }
            }
        }

        let stored = match store.load_index_record()? {
            Some(raw) => match serde_json::from_str::<IndexRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Cache index record is unreadable, rebuilding: {}", e);
                    None
                }
            },
            None => None,
        };

        let computed = state.index_record();
        match stored {
            Some(record)
                if record.total_pages == computed.total_pages
                    && record.categories == computed.categories =>
            {
                state.last_full_crawl = record.last_full_crawl;
            }
            stale => {
                if let Some(record) = stale {
                    tracing::info!(
                        "Cache index record lists {} pages, found {}; rebuilding",
                        record.total_pages,
                        computed.total_pages
                    );
                    state.last_full_crawl = record.last_full_crawl;
                }
                store.put_index_record(&serde_json::to_string(&state.index_record())?)?;
            }
        }

        tracing::debug!(
            "Loaded {} cached pages in {} categories",
            state.pages.len(),
            state.categories.len()
        );

        Ok(Self {
            store: Mutex::new(store),
            state: RwLock::new(state),
            skipped_records,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn Storage>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a page
    ///
    /// The page row is committed before the in-memory view and the index
    /// record change. `last_crawled` never moves backwards: if the stored
    /// copy was crawled later, its timestamp is kept.
    ///
    /// Writers are serialized on the backend; readers are only blocked for
    /// the in-memory update, never for a commit.
    ///
    /// # Errors
    ///
    /// A failed page write leaves the cache unchanged. A failed index write
    /// is reported as [`StorageError::IndexRecord`].
    pub fn save(&self, page: &Page) -> StorageResult<()> {
        let mut store = self.store();

        let mut page = page.clone();
        if let Some(existing) = self.read().pages.get(&page.url) {
            if existing.last_crawled > page.last_crawled {
                page.last_crawled = existing.last_crawled;
            }
        }

        let row = PageRow {
            url: page.url.as_str().to_string(),
            category: page.category.clone(),
            last_crawled: page.last_crawled.to_rfc3339(),
            record: serde_json::to_string(&page)?,
        };
        store.put_page(&row)?;

        let record = {
            let mut state = self.write();
            state.insert(page);
            serde_json::to_string(&state.index_record())?
        };

        store
            .put_index_record(&record)
            .map_err(|e| StorageError::IndexRecord(e.to_string()))
    }

    /// Stamps the time of the last full crawl
    pub fn mark_full_crawl(&self, at: DateTime<Utc>) -> StorageResult<()> {
        let mut store = self.store();

        let record = {
            let mut state = self.write();
            state.last_full_crawl = Some(at);
            serde_json::to_string(&state.index_record())?
        };

        store
            .put_index_record(&record)
            .map_err(|e| StorageError::IndexRecord(e.to_string()))
    }

    /// Gets a page by canonical URL
    pub fn get(&self, url: &CanonicalUrl) -> Option<Page> {
        self.read().pages.get(url).cloned()
    }

    /// Snapshot of every cached page, in URL order
    pub fn get_all(&self) -> Vec<Page> {
        self.read().pages.values().cloned().collect()
    }

    /// Snapshot of every cached URL, in URL order
    pub fn urls(&self) -> Vec<CanonicalUrl> {
        self.read().pages.keys().cloned().collect()
    }

    /// Pages in a category, in URL order
    pub fn get_by_category(&self, category: &str) -> Vec<Page> {
        let state = self.read();
        state
            .categories
            .get(category)
            .map(|urls| {
                urls.iter()
                    .filter_map(|url| state.pages.get(url).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Category name -> page count
    pub fn list_categories(&self) -> BTreeMap<String, usize> {
        self.read().index_record().categories
    }

    /// Keyword search over titles and content, case-insensitive
    pub fn search_local(&self, query: &str, limit: usize) -> Vec<Page> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.read()
            .pages
            .values()
            .filter(|page| page.matches(&query))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().pages.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        CacheStats {
            total_pages: state.pages.len(),
            category_count: state.categories.len(),
            last_full_crawl: state.last_full_crawl,
            skipped_records: self.skipped_records,
        }
    }
}
