//! URL handling module for Docs-Ingest
//!
//! This module provides URL canonicalization (the identity used for dedup and
//! caching) and the scope policy that decides which URLs are crawlable.

mod canonical;
mod policy;

pub use canonical::CanonicalUrl;
pub use policy::UrlPolicy;
