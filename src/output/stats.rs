//! Console reports for runs, the page cache, and the refresh scheduler
//!
//! Each report is rendered into a `String` by a `format_*` function so it
//! can be tested; the `print_*` functions write that string to stdout.

use crate::content::{Page, ReindexSummary};
use crate::refresh::SchedulerStatus;
use crate::state::CrawlSummary;
use crate::storage::CacheStats;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Renders the summary of one crawl or refresh run
pub fn format_crawl_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} Run Summary ===\n", title_case(summary.mode.as_str()));

    let _ = writeln!(out, "Outcome: {}", summary.outcome);
    let _ = writeln!(out, "Duration: {:.1}s", summary.duration.as_secs_f64());
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Discovered: {}", summary.pages_discovered);
    let _ = writeln!(out, "  Visited: {}", summary.pages_visited);
    let _ = writeln!(out, "  Saved: {}", summary.pages_succeeded);
    let _ = writeln!(out, "  Failed: {}", summary.pages_failed);
    if summary.index_errors > 0 {
        let _ = writeln!(out, "  Index errors: {}", summary.index_errors);
    }
    let _ = writeln!(out, "  Rate: {:.2} pages/sec", summary.rate());
    let _ = writeln!(out);

    if !summary.failed_urls.is_empty() {
        let _ = writeln!(out, "Failed URLs (first {}):", summary.failed_urls.len());
        for failed in &summary.failed_urls {
            let _ = writeln!(out, "  - {}: {}", failed.url, failed.reason);
        }
        let _ = writeln!(out);
    }

    let attempted = summary.pages_succeeded + summary.pages_failed;
    let _ = writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} pages saved)",
        percentage(summary.pages_succeeded, attempted),
        summary.pages_succeeded,
        attempted
    );

    out
}

pub fn print_crawl_summary(summary: &CrawlSummary) {
    print!("{}", format_crawl_summary(summary));
}

/// Renders the page cache statistics
pub fn format_cache_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Cache Statistics ===\n");
    let _ = writeln!(out, "  Total pages: {}", stats.total_pages);
    let _ = writeln!(out, "  Categories: {}", stats.category_count);
    let _ = writeln!(out, "  Last full crawl: {}", format_time(stats.last_full_crawl));
    if stats.skipped_records > 0 {
        let _ = writeln!(
            out,
            "  Unreadable records skipped at load: {}",
            stats.skipped_records
        );
    }
    out
}

pub fn print_cache_stats(stats: &CacheStats) {
    print!("{}", format_cache_stats(stats));
}

/// Renders categories sorted by page count, largest first
pub fn format_categories(categories: &BTreeMap<String, usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Categories ({}) ===\n", categories.len());

    let total: usize = categories.values().sum();
    let mut counts: Vec<_> = categories.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (name, count) in counts {
        let _ = writeln!(
            out,
            "  {}: {} ({:.1}%)",
            name,
            count,
            percentage(*count, total)
        );
    }
    out
}

pub fn print_categories(categories: &BTreeMap<String, usize>) {
    print!("{}", format_categories(categories));
}

/// Renders local search hits, one line per page
pub fn format_search_results(query: &str, pages: &[Page]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} result(s) for \"{}\":\n", pages.len(), query);
    for page in pages {
        let category = page.category.as_deref().unwrap_or("uncategorized");
        let _ = writeln!(out, "  {} [{}]", page.title, category);
        let _ = writeln!(out, "    {}", page.url);
    }
    out
}

pub fn print_search_results(query: &str, pages: &[Page]) {
    print!("{}", format_search_results(query, pages));
}

/// Renders the refresh scheduler status
pub fn format_scheduler_status(status: &SchedulerStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Refresh Scheduler ===\n");
    let _ = writeln!(
        out,
        "  Scheduler: {}",
        if status.scheduler_running { "running" } else { "stopped" }
    );
    let _ = writeln!(out, "  Refresh in progress: {}", status.refresh_in_progress);
    let _ = writeln!(out, "  Last refresh: {}", format_time(status.last_refresh_time));
    let _ = writeln!(
        out,
        "  Last outcome: {}",
        status
            .last_refresh_outcome
            .map_or("none", |outcome| outcome.as_str())
    );
    let _ = writeln!(out, "  Pages updated: {}", status.pages_updated);
    let _ = writeln!(
        out,
        "  Next scheduled refresh: {}",
        format_time(status.next_scheduled_refresh_time)
    );
    if status.skipped_runs > 0 {
        let _ = writeln!(out, "  Skipped firings: {}", status.skipped_runs);
    }
    if let Some(error) = &status.last_error {
        let _ = writeln!(out, "  Last error: {}", error);
    }
    out
}

pub fn print_scheduler_status(status: &SchedulerStatus) {
    print!("{}", format_scheduler_status(status));
}

/// Renders the result of a cache re-index
pub fn format_reindex_summary(summary: &ReindexSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Re-index Summary ===\n");
    let _ = writeln!(out, "  Indexed: {}", summary.indexed);
    let _ = writeln!(out, "  Failed: {}", summary.failed);
    let _ = writeln!(out, "  Duration: {:.1}s", summary.duration.as_secs_f64());
    out
}

pub fn print_reindex_summary(summary: &ReindexSummary) {
    print!("{}", format_reindex_summary(summary));
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
