//! Incremental refresh and refresh scheduler tests

use crate::common::{doc_page, link, mount_delayed, mount_html, mount_status, test_config};
use chrono::NaiveTime;
use docs_ingest::refresh::{RefreshOutcome, RefreshScheduler, TriggerResult};
use docs_ingest::state::CrawlMode;
use docs_ingest::{CanonicalUrl, Coordinator, CrawlPhase, PageCache};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

fn canonical(server: &MockServer, path: &str) -> CanonicalUrl {
    CanonicalUrl::parse(&format!("{}{}", server.uri(), path)).unwrap()
}

fn refresh_time() -> NaiveTime {
    NaiveTime::from_hms_opt(2, 0, 0).unwrap()
}

/// Crawls a three-page site and returns the coordinator and its cache
async fn crawl_site(server: &MockServer, dir: &TempDir) -> (Arc<Coordinator>, Arc<PageCache>) {
    let root_body = [
        link(server, "/aws/en/guide/a"),
        link(server, "/aws/en/guide/b"),
    ]
    .join("\n");
    mount_html(server, "/aws/en", doc_page("Home", &root_body), None).await;
    mount_html(server, "/aws/en/guide/a", doc_page("A", ""), None).await;
    mount_html(server, "/aws/en/guide/b", doc_page("B", ""), None).await;

    let config = test_config(server, &dir.path().join("cache.db"));
    let cache = Arc::new(PageCache::open(&dir.path().join("cache.db")).unwrap());
    let coordinator = Arc::new(Coordinator::new(&config, Arc::clone(&cache)).unwrap());

    let summary = coordinator.crawl().await.expect("Initial crawl failed");
    assert_eq!(summary.pages_succeeded, 3);

    (coordinator, cache)
}

#[tokio::test]
async fn test_refresh_keeps_stale_page_on_404() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (coordinator, cache) = crawl_site(&server, &dir).await;

    let b_url = canonical(&server, "/aws/en/guide/b");
    let b_before = cache.get(&b_url).unwrap();

    server.reset().await;
    let root_body = link(&server, "/aws/en/guide/new");
    mount_html(&server, "/aws/en", doc_page("Home v2", &root_body), None).await;
    mount_html(&server, "/aws/en/guide/a", doc_page("A v2", ""), None).await;
    mount_status(&server, "/aws/en/guide/b", 404).await;
    mount_html(&server, "/aws/en/guide/new", doc_page("New", ""), Some(0)).await;

    let summary = coordinator.refresh().await.expect("Refresh failed");

    assert_eq!(summary.mode, CrawlMode::Refresh);
    assert_eq!(summary.outcome, CrawlPhase::Completed);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.failed_urls[0].url, b_url);

    assert_eq!(cache.len(), 3);
    let b_after = cache.get(&b_url).unwrap();
    assert_eq!(b_after.title, "B");
    assert_eq!(b_after.last_crawled, b_before.last_crawled);

    let root = cache.get(&canonical(&server, "/aws/en")).unwrap();
    assert_eq!(root.title, "Home v2");
    assert!(cache.get(&canonical(&server, "/aws/en/guide/new")).is_none());
}

#[tokio::test]
async fn test_refresh_ignores_page_limit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (_crawler, cache) = crawl_site(&server, &dir).await;
    let before: Vec<_> = cache.get_all().into_iter().map(|p| p.last_crawled).collect();

    let config = test_config(&server, &dir.path().join("cache.db"));
    let limited = Coordinator::new(&config, Arc::clone(&cache))
        .unwrap()
        .with_max_pages(Some(2));

    let summary = limited.refresh().await.expect("Refresh failed");

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.pages_succeeded, 3);
    let after: Vec<_> = cache.get_all().into_iter().map(|p| p.last_crawled).collect();
    assert!(before.iter().zip(&after).all(|(old, new)| new > old));
}

#[tokio::test]
async fn test_manual_trigger_is_single_flight() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (coordinator, cache) = crawl_site(&server, &dir).await;

    server.reset().await;
    for route in ["/aws/en", "/aws/en/guide/a", "/aws/en/guide/b"] {
        mount_delayed(
            &server,
            route,
            doc_page("Slow", ""),
            Duration::from_millis(200),
            None,
        )
        .await;
    }

    let scheduler = RefreshScheduler::new(Arc::clone(&coordinator), refresh_time());

    assert_eq!(scheduler.trigger_manual(), TriggerResult::Scheduled);
    assert_eq!(scheduler.trigger_manual(), TriggerResult::AlreadyRunning);
    assert!(scheduler.status().refresh_in_progress);

    scheduler.wait_for_idle().await;

    let status = scheduler.status();
    assert!(!status.refresh_in_progress);
    assert!(!status.scheduler_running);
    assert_eq!(status.last_refresh_outcome, Some(RefreshOutcome::Success));
    assert_eq!(status.pages_updated, 3);
    assert!(status.last_refresh_time.is_some());
    assert_eq!(status.skipped_runs, 0);
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn test_refresh_failure_is_reported_in_status() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (coordinator, _cache) = crawl_site(&server, &dir).await;

    server.reset().await;
    mount_delayed(
        &server,
        "/aws/en",
        doc_page("Slow", ""),
        Duration::from_millis(300),
        None,
    )
    .await;

    // Keep the coordinator busy with a crawl so the refresh cannot start
    let crawl = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.crawl().await })
    };
    while coordinator.phase() != CrawlPhase::Running {
        tokio::task::yield_now().await;
    }

    let scheduler = RefreshScheduler::new(Arc::clone(&coordinator), refresh_time());
    assert_eq!(scheduler.trigger_manual(), TriggerResult::Scheduled);
    scheduler.wait_for_idle().await;

    let status = scheduler.status();
    assert_eq!(status.last_refresh_outcome, Some(RefreshOutcome::Failed));
    assert_eq!(
        status.last_error.as_deref(),
        Some("A crawl is already running")
    );

    crawl.await.unwrap().expect("Crawl failed");
}
