use crate::config::ScopeConfig;
use crate::url::CanonicalUrl;
use url::Url;

/// Decides whether a URL belongs to the documentation corpus
///
/// The policy is a pure predicate: it never looks at visited state, so the
/// same URL always gets the same answer.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    host: String,
    base_path: String,
    exclude: Vec<String>,
}

impl UrlPolicy {
    /// Creates a policy for the given host, path prefix, and exclusion substrings
    pub fn new(host: impl Into<String>, base_path: impl Into<String>, exclude: Vec<String>) -> Self {
        Self {
            host: host.into().to_lowercase(),
            base_path: base_path.into(),
            exclude,
        }
    }

    /// Creates a policy from the `[scope]` configuration section
    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(&config.host, &config.base_path, config.exclude.clone())
    }

    /// Checks a URL against the scope rules
    ///
    /// # Rules (first failing rule rejects)
    ///
    /// 1. Host (with port, when non-default) must equal the configured host
    /// 2. Path must start with the configured base path
    /// 3. Path, query, and fragment must not contain any exclusion substring
    ///
    /// # Examples
    ///
    /// ```
    /// use docs_ingest::url::UrlPolicy;
    /// use url::Url;
    ///
    /// let policy = UrlPolicy::new("docs.example.com", "/aws/en", vec!["/api/".to_string()]);
    /// assert!(policy.in_scope(&Url::parse("https://docs.example.com/aws/en/guide").unwrap()));
    /// assert!(!policy.in_scope(&Url::parse("https://docs.example.com/aws/en/api/x").unwrap()));
    /// ```
    pub fn in_scope(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(host) => host,
            None => return false,
        };

        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        if !authority.eq_ignore_ascii_case(&self.host) {
            return false;
        }

        if !url.path().starts_with(&self.base_path) {
            return false;
        }

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            target.push('#');
            target.push_str(fragment);
        }

        !self
            .exclude
            .iter()
            .any(|pattern| target.contains(pattern.as_str()))
    }

    /// Checks a canonical URL against the scope rules
    pub fn admits(&self, url: &CanonicalUrl) -> bool {
        url.to_url().map(|url| self.in_scope(&url)).unwrap_or(false)
    }
}
