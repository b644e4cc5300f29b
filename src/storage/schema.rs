//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the page cache database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per cached page, keyed by canonical URL
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    category TEXT,
    last_crawled TEXT NOT NULL,
    record TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_category ON pages(category);

-- Single-row summary of the cache, rebuildable from pages
CREATE TABLE IF NOT EXISTS cache_index (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    record TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Version stored in `PRAGMA user_version` by [`initialize_schema`]
pub const SCHEMA_VERSION: u32 = 1;

/// Creates missing tables and stamps the schema version
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version of an open database (0 for a fresh file)
pub fn get_schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}
