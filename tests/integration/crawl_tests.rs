//! End-to-end full crawl tests

use crate::common::{
    doc_page, link, mount_delayed, mount_html, mount_recorded, mount_redirect, mount_status,
    peak_overlap, test_config,
};
use docs_ingest::content::{IndexError, Indexer, Page};
use docs_ingest::storage::{PageRow, SqliteStorage, Storage, StorageError, StorageResult};
use docs_ingest::{CanonicalUrl, Coordinator, CrawlPhase, IngestError, PageCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn canonical(server: &MockServer, path: &str) -> CanonicalUrl {
    CanonicalUrl::parse(&format!("{}{}", server.uri(), path)).unwrap()
}

#[tokio::test]
async fn test_full_crawl_follows_in_scope_links_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = [
        link(&server, "/aws/en/getting-started/install"),
        link(&server, "/aws/en/sql/joins"),
        link(&server, "/aws/en/api/reference"),
        r#"<a href="https://other.example.com/aws/en/foreign">Foreign</a>"#.to_string(),
    ]
    .join("\n");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), Some(1)).await;

    let install_body = [
        link(&server, "/aws/en"),
        link(&server, "/aws/en/sql/joins/"),
        link(&server, "/aws/en/sql/joins#inner"),
        link(&server, "/aws/en/sql/joins?tab=python"),
    ]
    .join("\n");
    mount_html(
        &server,
        "/aws/en/getting-started/install",
        doc_page("Install", &install_body),
        Some(1),
    )
    .await;
    mount_html(&server, "/aws/en/sql/joins", doc_page("Joins", ""), Some(1)).await;
    mount_html(&server, "/aws/en/api/reference", doc_page("API", ""), Some(0)).await;

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(coordinator.phase(), CrawlPhase::Completed);
    assert_eq!(summary.pages_succeeded, 3);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.pages_discovered, 3);

    assert_eq!(cache.len(), 3);
    assert!(cache.get(&canonical(&server, "/aws/en")).is_some());
    assert!(cache
        .urls()
        .iter()
        .all(|url| !url.as_str().contains("other.example.com")));

    let joins = cache.get(&canonical(&server, "/aws/en/sql/joins")).unwrap();
    assert_eq!(joins.title, "Joins");
    assert_eq!(joins.category.as_deref(), Some("sql"));

    let categories = cache.list_categories();
    assert_eq!(categories.get("getting-started"), Some(&1));
    assert_eq!(categories.get("sql"), Some(&1));
    assert!(cache.stats().last_full_crawl.is_some());
}

#[tokio::test]
async fn test_page_limit_stops_dispatch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body: Vec<String> = (1..=6)
        .map(|n| link(&server, &format!("/aws/en/guide/p{}", n)))
        .collect();
    mount_html(&server, "/aws/en", doc_page("Home", &root_body.join("\n")), None).await;
    for n in 1..=6 {
        mount_html(
            &server,
            &format!("/aws/en/guide/p{}", n),
            doc_page(&format!("Page {}", n), ""),
            None,
        )
        .await;
    }

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache))
        .unwrap()
        .with_max_pages(Some(3));

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(summary.pages_visited, 3);
    assert!(summary.pages_succeeded <= 3);
    assert!(cache.len() <= 3);
    assert_eq!(summary.pages_discovered, 7);
}

#[tokio::test]
async fn test_failed_fetch_is_recorded_and_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = [
        link(&server, "/aws/en/guide/ok"),
        link(&server, "/aws/en/guide/missing"),
    ]
    .join("\n");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_html(&server, "/aws/en/guide/ok", doc_page("Ok", ""), None).await;
    mount_status(&server, "/aws/en/guide/missing", 404).await;

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.failed_urls.len(), 1);
    assert_eq!(
        summary.failed_urls[0].url,
        canonical(&server, "/aws/en/guide/missing")
    );
    assert!(summary.failed_urls[0].reason.contains("404"));
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_rejects_second_run_while_running() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_delayed(
        &server,
        "/aws/en",
        doc_page("Home", ""),
        Duration::from_millis(300),
        None,
    )
    .await;

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Arc::new(Coordinator::new(&config, cache).unwrap());

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.crawl().await })
    };

    while coordinator.phase() != CrawlPhase::Running {
        tokio::task::yield_now().await;
    }

    assert!(matches!(
        coordinator.crawl().await,
        Err(IngestError::AlreadyRunning)
    ));
    assert!(matches!(
        coordinator.refresh().await,
        Err(IngestError::AlreadyRunning)
    ));

    let summary = running.await.unwrap().expect("First crawl failed");
    assert_eq!(summary.pages_succeeded, 1);

    // A finished coordinator can run again
    let again = coordinator.crawl().await.expect("Second crawl failed");
    assert_eq!(again.outcome, CrawlPhase::Completed);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body: Vec<String> = (1..=10)
        .map(|n| link(&server, &format!("/aws/en/guide/p{}", n)))
        .collect();
    mount_html(&server, "/aws/en", doc_page("Home", &root_body.join("\n")), None).await;
    for n in 1..=10 {
        mount_delayed(
            &server,
            &format!("/aws/en/guide/p{}", n),
            doc_page(&format!("Page {}", n), ""),
            Duration::from_millis(200),
            None,
        )
        .await;
    }

    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.max_concurrent_fetches = 1;
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Arc::new(Coordinator::new(&config, Arc::clone(&cache)).unwrap());

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.crawl().await })
    };

    while cache.is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    coordinator.cancel();

    let summary = running.await.unwrap().expect("Cancelled crawl failed");

    assert_eq!(summary.outcome, CrawlPhase::Aborted);
    assert_eq!(coordinator.phase(), CrawlPhase::Aborted);
    assert!(summary.pages_visited < 11);
    assert!(cache.len() < 11);
    assert!(cache.stats().last_full_crawl.is_some());
}

/// Indexer that rejects every page
struct RejectingIndexer;

impl Indexer for RejectingIndexer {
    fn index(&self, _page: &Page) -> Result<(), IndexError> {
        Err(IndexError::Backend("index offline".to_string()))
    }
}

#[tokio::test]
async fn test_index_errors_do_not_fail_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = link(&server, "/aws/en/guide/one");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_html(&server, "/aws/en/guide/one", doc_page("One", ""), None).await;

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache))
        .unwrap()
        .with_indexer(Arc::new(RejectingIndexer));

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.index_errors, 2);
    assert_eq!(cache.len(), 2);
}

/// Storage whose index-record writes fail while `fail_index` is set
struct FlakyIndexStorage {
    inner: SqliteStorage,
    fail_index: Arc<AtomicBool>,
}

impl Storage for FlakyIndexStorage {
    fn put_page(&mut self, row: &PageRow) -> StorageResult<()> {
        self.inner.put_page(row)
    }

    fn load_pages(&self) -> StorageResult<Vec<PageRow>> {
        self.inner.load_pages()
    }

    fn load_index_record(&self) -> StorageResult<Option<String>> {
        self.inner.load_index_record()
    }

    fn put_index_record(&mut self, record: &str) -> StorageResult<()> {
        if self.fail_index.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.put_index_record(record)
    }
}

#[tokio::test]
async fn test_index_record_failure_aborts_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(&server, "/aws/en", doc_page("Home", ""), None).await;

    let fail_index = Arc::new(AtomicBool::new(false));
    let storage = FlakyIndexStorage {
        inner: SqliteStorage::new_in_memory().unwrap(),
        fail_index: Arc::clone(&fail_index),
    };
    let cache = Arc::new(PageCache::with_storage(Box::new(storage)).unwrap());

    let config = test_config(&server, &dir.path().join("unused.db"));
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    fail_index.store(true, Ordering::SeqCst);
    let result = coordinator.crawl().await;

    assert!(matches!(
        result,
        Err(IngestError::Storage(StorageError::IndexRecord(_)))
    ));
    assert_eq!(coordinator.phase(), CrawlPhase::Aborted);

    fail_index.store(false, Ordering::SeqCst);
    let summary = coordinator.crawl().await.expect("Recovered crawl failed");
    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_in_flight_fetches_never_exceed_cap() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let delay = Duration::from_millis(150);

    let root_body: Vec<String> = (1..=8)
        .map(|n| link(&server, &format!("/aws/en/guide/p{}", n)))
        .collect();
    mount_html(&server, "/aws/en", doc_page("Home", &root_body.join("\n")), None).await;
    let arrivals = mount_recorded(&server, "^/aws/en/guide/", doc_page("Guide", ""), delay).await;

    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.max_concurrent_fetches = 2;
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");
    assert_eq!(summary.pages_succeeded, 9);

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 8);
    // A slot frees only after a full response, so arrivals closer than the
    // response delay were in flight together
    assert_eq!(peak_overlap(&arrivals, delay * 4 / 5), 2);
}

#[tokio::test]
async fn test_sitemap_entries_seed_full_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{uri}/aws/en/</loc></url>
  <url><loc>{uri}/aws/en/guide/orphan</loc></url>
  <url><loc>{uri}/aws/en/api/reference</loc></url>
  <url><loc>https://other.example.com/aws/en/foreign</loc></url>
</urlset>"#,
        uri = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/aws/en/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;

    mount_html(&server, "/aws/en", doc_page("Home", ""), Some(1)).await;
    mount_html(&server, "/aws/en/guide/orphan", doc_page("Orphan", ""), Some(1)).await;
    mount_html(&server, "/aws/en/api/reference", doc_page("API", ""), Some(0)).await;

    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.sitemap_url = Some(format!("{}/aws/en/sitemap.xml", server.uri()));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.pages_succeeded, 2);
    assert!(cache.get(&canonical(&server, "/aws/en/guide/orphan")).is_some());
    assert!(cache.get(&canonical(&server, "/aws/en/api/reference")).is_none());
}

#[tokio::test]
async fn test_missing_sitemap_falls_back_to_roots() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_status(&server, "/aws/en/sitemap.xml", 404).await;
    let root_body = link(&server, "/aws/en/guide/a");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_html(&server, "/aws/en/guide/a", doc_page("A", ""), None).await;

    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.sitemap_url = Some(format!("{}/aws/en/sitemap.xml", server.uri()));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 0);
}

#[tokio::test]
async fn test_redirect_target_is_not_fetched_again() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = [
        link(&server, "/aws/en/guide/old"),
        link(&server, "/aws/en/guide/new"),
    ]
    .join("\n");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_redirect(&server, "/aws/en/guide/old", "/aws/en/guide/new").await;
    mount_html(&server, "/aws/en/guide/new", doc_page("New", ""), Some(1)).await;

    // One fetch at a time so the redirect resolves before the target is dequeued
    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.max_concurrent_fetches = 1;
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_visited, 2);
    assert_eq!(cache.len(), 2);
    let stored = cache.get(&canonical(&server, "/aws/en/guide/old")).unwrap();
    assert_eq!(stored.title, "New");
    assert!(cache.get(&canonical(&server, "/aws/en/guide/new")).is_none());
}

#[tokio::test]
async fn test_redirect_to_visited_page_stores_no_copy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = [
        link(&server, "/aws/en/guide/new"),
        link(&server, "/aws/en/guide/old"),
    ]
    .join("\n");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_redirect(&server, "/aws/en/guide/old", "/aws/en/guide/new").await;
    mount_html(&server, "/aws/en/guide/new", doc_page("New", ""), Some(2)).await;

    let mut config = test_config(&server, &dir.path().join("cache.db"));
    config.crawler.max_concurrent_fetches = 1;
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&canonical(&server, "/aws/en/guide/new")).is_some());
    assert!(cache.get(&canonical(&server, "/aws/en/guide/old")).is_none());
}

#[tokio::test]
async fn test_non_html_response_is_recorded_as_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let root_body = link(&server, "/aws/en/guide/data");
    mount_html(&server, "/aws/en", doc_page("Home", &root_body), None).await;
    Mock::given(method("GET"))
        .and(path("/aws/en/guide/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"rows\": []}", "application/json"))
        .mount(&server)
        .await;

    let config = test_config(&server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Coordinator::new(&config, Arc::clone(&cache)).unwrap();

    let summary = coordinator.crawl().await.expect("Crawl failed");

    assert_eq!(summary.pages_succeeded, 1);
    assert_eq!(summary.pages_failed, 1);
    assert!(summary.failed_urls[0]
        .reason
        .contains("Unsupported content type 'application/json'"));
    assert!(cache.get(&canonical(&server, "/aws/en/guide/data")).is_none());
}
