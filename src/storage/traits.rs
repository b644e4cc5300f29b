//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::PageRow;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache index record could not be written; the cache on disk no
    /// longer matches the pages it was just given
    #[error("Failed to write cache index record: {0}")]
    IndexRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write is durable when it returns: a crash leaves either the old
/// or the new complete record, never a partial one.
pub trait Storage: Send {
    // ===== Page Rows =====

    /// Inserts or replaces the row for `row.url`
    fn put_page(&mut self, row: &PageRow) -> StorageResult<()>;

    /// Loads every row, in URL order
    fn load_pages(&self) -> StorageResult<Vec<PageRow>>;

    // ===== Index Record =====

    /// Loads the raw JSON index record, if one was ever written
    fn load_index_record(&self) -> StorageResult<Option<String>>;

    /// Replaces the JSON index record
    fn put_index_record(&mut self, record: &str) -> StorageResult<()>;
}
