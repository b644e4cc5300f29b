//! Output module for run summaries and reports
//!
//! This module handles:
//! - Rendering crawl and refresh run summaries
//! - Displaying cache statistics and categories
//! - Displaying local search results and the scheduler status
//! - Rendering re-index results

pub mod stats;

pub use stats::{
    format_cache_stats, format_categories, format_crawl_summary, format_reindex_summary,
    format_scheduler_status, format_search_results, print_cache_stats, print_categories,
    print_crawl_summary, print_reindex_summary, print_scheduler_status, print_search_results,
};
