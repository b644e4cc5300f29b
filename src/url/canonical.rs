use crate::UrlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A URL in canonical form: no query string, no fragment, no trailing slash
///
/// Two raw URLs that differ only in query, fragment, or trailing slashes map
/// to the same `CanonicalUrl`. This is the identity key for frontier dedup and
/// for the page cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Canonicalizes a raw URL string
    ///
    /// # Canonicalization Steps
    ///
    /// 1. Parse the URL; reject if malformed (dot segments are resolved and
    ///    the host is lowercased by the parser)
    /// 2. Reject anything that is not HTTP or HTTPS, or has no host
    /// 3. Drop the query string and fragment
    /// 4. Remove trailing slashes
    ///
    /// # Examples
    ///
    /// ```
    /// use docs_ingest::url::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("https://Docs.Example.com/aws/en/guide/?tab=1#intro").unwrap();
    /// assert_eq!(url.as_str(), "https://docs.example.com/aws/en/guide");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(&url)
    }

    /// Canonicalizes an already parsed URL
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingHost);
        }

        let mut url = url.clone();
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the canonical form back into a `Url`
    pub fn to_url(&self) -> Result<Url, UrlError> {
        Url::parse(&self.0).map_err(|e| UrlError::Parse(e.to_string()))
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
