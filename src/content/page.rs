use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A heading-delimited part of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,

    /// Heading depth, 1 through 6
    pub level: u8,

    pub content: String,

    /// Fragment identifier of the heading, when it has one
    #[serde(default)]
    pub anchor: Option<String>,
}

/// One documentation page, keyed by its canonical URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: CanonicalUrl,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sections: Vec<Section>,

    /// Root-to-leaf navigation path
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// When the site says the page last changed
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// When the page was last fetched successfully
    pub last_crawled: DateTime<Utc>,
}

impl Page {
    /// Creates a page with only identity, title, and body set
    pub fn new(url: CanonicalUrl, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            content: content.into(),
            sections: Vec::new(),
            breadcrumbs: Vec::new(),
            category: None,
            tags: BTreeSet::new(),
            last_updated: None,
            last_crawled: Utc::now(),
        }
    }

    /// Case-insensitive substring match over title and content
    pub fn matches(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
    }
}
