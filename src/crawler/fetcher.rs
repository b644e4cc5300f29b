//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Capping the number of fetches in flight
//! - Pacing request starts to the global requests-per-second ceiling
//! - Classifying failures as per-URL errors

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::pacer::RequestPacer;
use crate::url::CanonicalUrl;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Per-URL fetch failures
///
/// None of these abort a run; the URL is counted as failed and skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// A successfully fetched response body
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Final URL after redirects
    pub final_url: Url,

    /// Content-Type header value (empty when absent)
    pub content_type: String,

    pub body: Vec<u8>,
}

impl FetchedBody {
    /// Whether the body can be parsed as a page
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent has the form `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, concurrency-capped HTTP fetcher
pub struct Fetcher {
    client: Client,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    pacer: RequestPacer,
}

impl Fetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;
        Ok(Self::with_client(
            client,
            crawler.max_concurrent_fetches,
            crawler.requests_per_second,
        ))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, max_in_flight: usize, requests_per_second: f64) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            pacer: RequestPacer::new(requests_per_second),
        }
    }

    /// Maximum number of fetches in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Fetches a URL
    ///
    /// Waits for a concurrency permit, then for the next pacing slot, then
    /// sends the request. The permit is held until the body is read.
    pub async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedBody, FetchError> {
        let target = url
            .to_url()
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        self.pacer.wait().await;

        tracing::trace!("GET {}", target);
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok(FetchedBody {
            final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}

fn classify_error(url: &CanonicalUrl, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Transport {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
