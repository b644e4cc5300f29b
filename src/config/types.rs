use serde::Deserialize;

/// Main configuration structure for Docs-Ingest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub scope: ScopeConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Entry points of a full crawl
    #[serde(rename = "root-urls")]
    pub root_urls: Vec<String>,

    /// Sitemap whose `<loc>` entries seed a full crawl alongside the roots
    #[serde(rename = "sitemap-url", default)]
    pub sitemap_url: Option<String>,

    /// Maximum number of pages visited by a single full crawl
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    /// Maximum number of fetches in flight at once
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: usize,

    /// Global ceiling on requests started per second
    #[serde(rename = "requests-per-second", default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a cancelled run waits for in-flight pages (seconds)
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Which URLs belong to the documentation corpus
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Documentation host, with `:port` when the site is not on a default port
    pub host: String,

    /// Path prefix every in-scope page starts with (e.g. "/aws/en")
    #[serde(rename = "base-path")]
    pub base_path: String,

    /// Substrings that exclude a URL from the crawl
    #[serde(default = "default_exclusions")]
    pub exclude: Vec<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Page cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Refresh scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether `serve` starts the daily refresh trigger
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Local time of day of the refresh, "HH:MM"
    #[serde(rename = "refresh-time", default = "default_refresh_time")]
    pub refresh_time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_time: default_refresh_time(),
        }
    }
}

fn default_max_concurrent_fetches() -> usize {
    20
}

fn default_requests_per_second() -> f64 {
    10.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_refresh_time() -> String {
    "02:00".to_string()
}

/// Exclusion substrings applied when `exclude` is not configured
pub fn default_exclusions() -> Vec<String> {
    ["/api/", "/release-notes/", ".pdf", ".zip", ".tar", "#", "?"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
