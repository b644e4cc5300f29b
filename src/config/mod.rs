//! Configuration module for Docs-Ingest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docs_ingest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docs-ingest.toml")).unwrap();
//! println!("Crawl starts at: {:?}", config.crawler.root_urls);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_exclusions, CacheConfig, Config, CrawlerConfig, SchedulerConfig, ScopeConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{parse_refresh_time, validate};
