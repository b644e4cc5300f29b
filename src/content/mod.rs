//! Content extraction and indexing capabilities
//!
//! The crawl pipeline talks to content extraction and to the search index
//! only through the [`PageParser`] and [`Indexer`] traits:
//! - `HtmlPageParser` turns fetched HTML into a structured [`Page`]
//! - `NoopIndexer` and `TracingIndexer` stand in for an embedding index
//! - `reindex_cache` replays the whole cache into an indexer

mod html;
mod indexer;
mod page;

pub use html::HtmlPageParser;
pub use indexer::{reindex_cache, NoopIndexer, ReindexSummary, TracingIndexer};
pub use page::{Page, Section};

use crate::url::CanonicalUrl;
use thiserror::Error;

/// Errors produced while turning a fetched body into a page
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No main content found in {0}")]
    NoMainContent(String),

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Unsupported content type '{0}'")]
    UnsupportedContentType(String),
}

/// Errors reported by an index backend
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index backend error: {0}")]
    Backend(String),
}

/// Turns a fetched body into a structured page
pub trait PageParser: Send + Sync {
    /// Parses `body`, fetched for `url`, into a page keyed by `url`
    fn parse(&self, body: &[u8], url: &CanonicalUrl) -> Result<Page, ParseError>;
}

/// Receives every successfully saved page
///
/// Indexing the same URL twice replaces the earlier entry.
pub trait Indexer: Send + Sync {
    fn index(&self, page: &Page) -> Result<(), IndexError>;
}
