//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::{get_schema_version, initialize_schema};
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::PageRow;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    ///
    /// Each statement runs in its own transaction and `synchronous = FULL`
    /// makes every commit durable before the call returns.
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!(
            "Opened cache database {} (schema v{})",
            path.display(),
            get_schema_version(&conn)?
        );

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_page(row: &Row<'_>) -> rusqlite::Result<PageRow> {
        Ok(PageRow {
            url: row.get(0)?,
            category: row.get(1)?,
            last_crawled: row.get(2)?,
            record: row.get(3)?,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Page Rows =====

    fn put_page(&mut self, row: &PageRow) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO pages (url, category, last_crawled, record) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET
                category = excluded.category,
                last_crawled = excluded.last_crawled,
                record = excluded.record",
            params![row.url, row.category, row.last_crawled, row.record],
        )?;
        Ok(())
    }

    fn load_pages(&self) -> StorageResult<Vec<PageRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, category, last_crawled, record FROM pages ORDER BY url")?;

        let rows = stmt
            .query_map([], Self::row_to_page)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    // ===== Index Record =====

    fn load_index_record(&self) -> StorageResult<Option<String>> {
        let record = self
            .conn
            .query_row("SELECT record FROM cache_index WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(record)
    }

    fn put_index_record(&mut self, record: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cache_index (id, record, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
            params![record, now],
        )?;
        Ok(())
    }
}
