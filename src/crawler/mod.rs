//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching under a concurrency cap and a global rate ceiling
//! - Link extraction from fetched HTML
//! - Sitemap reading for full-crawl seeds
//! - The per-run frontier with URL deduplication
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod links;
mod pacer;
mod sitemap;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, FetchedBody, Fetcher};
pub use frontier::Frontier;
pub use links::extract_links;
pub use pacer::RequestPacer;
pub use sitemap::extract_sitemap_urls;
