//! Storage module for the page cache
//!
//! This module provides durable storage of ingested pages using SQLite,
//! and the in-memory page cache with its category index built on top of it.

mod cache;
mod schema;
mod sqlite;
mod traits;

pub use cache::PageCache;
pub use schema::{get_schema_version, initialize_schema};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A persisted page row
///
/// `record` is the JSON-serialized page; `category` and `last_crawled`
/// are copied out of it so they can be queried without deserializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub url: String,
    pub category: Option<String>,
    pub last_crawled: String,
    pub record: String,
}

/// Persisted summary of the cache, derivable from the page rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub total_pages: usize,

    /// Category name -> number of pages in it
    pub categories: BTreeMap<String, usize>,

    pub last_full_crawl: Option<DateTime<Utc>>,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_pages: usize,
    pub category_count: usize,
    pub last_full_crawl: Option<DateTime<Utc>>,

    /// Page rows skipped at load because they could not be read
    pub skipped_records: usize,
}
