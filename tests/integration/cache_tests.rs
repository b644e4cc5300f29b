//! Page cache persistence and reload tests

use chrono::{TimeZone, Utc};
use docs_ingest::storage::{PageRow, SqliteStorage, Storage};
use docs_ingest::{CanonicalUrl, Page, PageCache};
use tempfile::TempDir;

fn page(path: &str, category: Option<&str>) -> Page {
    let url = CanonicalUrl::parse(&format!("https://docs.example.com/aws/en/{}", path)).unwrap();
    let mut page = Page::new(url, format!("Title of {}", path), format!("Body of {}", path));
    page.category = category.map(str::to_string);
    page
}

#[test]
fn test_pages_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");
    let crawled_at = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();

    {
        let cache = PageCache::open(&db_path).unwrap();
        cache.save(&page("sql/joins", Some("sql"))).unwrap();
        cache.save(&page("sql/views", Some("sql"))).unwrap();
        cache.save(&page("admin/users", Some("admin"))).unwrap();
        cache.save(&page("overview", None)).unwrap();
        cache.mark_full_crawl(crawled_at).unwrap();
    }

    let cache = PageCache::open(&db_path).unwrap();
    let stats = cache.stats();
    assert_eq!(stats.total_pages, 4);
    assert_eq!(stats.category_count, 2);
    assert_eq!(stats.last_full_crawl, Some(crawled_at));
    assert_eq!(stats.skipped_records, 0);

    assert_eq!(cache.get_by_category("sql").len(), 2);
    assert_eq!(cache.list_categories().get("admin"), Some(&1));
    assert_eq!(cache.search_local("VIEWS", 10).len(), 1);
}

#[test]
fn test_corrupt_rows_are_skipped_at_load() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");

    {
        let cache = PageCache::open(&db_path).unwrap();
        cache.save(&page("sql/joins", Some("sql"))).unwrap();
        cache.save(&page("sql/views", Some("sql"))).unwrap();
    }

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage
            .put_page(&PageRow {
                url: "https://docs.example.com/aws/en/sql/views".to_string(),
                category: Some("sql".to_string()),
                last_crawled: Utc::now().to_rfc3339(),
                record: "{\"url\": \"https://docs.example.com/aws/en/sql/views\", \"title\":".to_string(),
            })
            .unwrap();
    }

    let cache = PageCache::open(&db_path).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().skipped_records, 1);
    assert_eq!(cache.list_categories().get("sql"), Some(&1));

    // The index record was rewritten to match the readable pages
    let storage = SqliteStorage::new(&db_path).unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&storage.load_index_record().unwrap().unwrap()).unwrap();
    assert_eq!(record["total_pages"], 1);
}

#[test]
fn test_unreadable_index_record_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");
    let crawled_at = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();

    {
        let cache = PageCache::open(&db_path).unwrap();
        cache.save(&page("sql/joins", Some("sql"))).unwrap();
        cache.save(&page("admin/users", Some("admin"))).unwrap();
        cache.mark_full_crawl(crawled_at).unwrap();
    }

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.put_index_record("not json").unwrap();
    }

    let cache = PageCache::open(&db_path).unwrap();
    let stats = cache.stats();
    assert_eq!(stats.total_pages, 2);
    assert_eq!(stats.category_count, 2);
    assert_eq!(stats.last_full_crawl, None);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&storage.load_index_record().unwrap().unwrap()).unwrap();
    assert_eq!(record["total_pages"], 2);
    assert_eq!(record["categories"]["admin"], 1);
}
