//! Docs-Ingest main entry point
//!
//! This is the command-line interface for the documentation ingestion pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use docs_ingest::config::{load_config_with_hash, Config};
use docs_ingest::content::{reindex_cache, Indexer, NoopIndexer, TracingIndexer};
use docs_ingest::output::{
    print_cache_stats, print_categories, print_crawl_summary, print_reindex_summary,
    print_scheduler_status, print_search_results,
};
use docs_ingest::refresh::RefreshScheduler;
use docs_ingest::{Coordinator, PageCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Docs-Ingest: a documentation-site ingestion pipeline
///
/// Docs-Ingest crawls one documentation site within a configured host and
/// base path, extracts structured pages, keeps them in a local cache, and
/// refreshes the cache daily.
#[derive(Parser, Debug)]
#[command(name = "docs-ingest")]
#[command(version = "1.0.0")]
#[command(about = "A documentation-site ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH", default_value = "docs-ingest.toml", global = true)]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the site from the configured root URLs and sitemap
    Crawl {
        /// Stop after visiting this many pages
        #[arg(long, value_name = "N")]
        max_pages: Option<usize>,

        /// Do not pass saved pages to the indexer
        #[arg(long)]
        no_index: bool,
    },

    /// Re-fetch every cached page without discovering new ones
    Refresh {
        /// Do not pass saved pages to the indexer
        #[arg(long)]
        no_index: bool,
    },

    /// Run the daily refresh scheduler until Ctrl-C
    Serve {
        /// Trigger a refresh immediately after starting
        #[arg(long)]
        refresh_now: bool,
    },

    /// Pass every cached page to the indexer again
    Reindex,

    /// Show page cache statistics
    Stats,

    /// List cached categories with their page counts
    Categories,

    /// Search cached page titles and content
    Search {
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Validate the configuration and show what would be crawled
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Crawl {
            max_pages,
            no_index,
        } => handle_crawl(&config, max_pages, no_index).await,
        Command::Refresh { no_index } => handle_refresh(&config, no_index).await,
        Command::Serve { refresh_now } => handle_serve(&config, refresh_now).await,
        Command::Reindex => {
            let cache = open_cache(&config)?;
            print_reindex_summary(&reindex_cache(&cache, &TracingIndexer));
            Ok(())
        }
        Command::Stats => {
            let cache = open_cache(&config)?;
            print_cache_stats(&cache.stats());
            Ok(())
        }
        Command::Categories => {
            let cache = open_cache(&config)?;
            print_categories(&cache.list_categories());
            Ok(())
        }
        Command::Search { query, limit } => {
            let cache = open_cache(&config)?;
            print_search_results(&query, &cache.search_local(&query, limit));
            Ok(())
        }
        Command::CheckConfig => {
            handle_check_config(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docs_ingest=info,warn"),
            1 => EnvFilter::new("docs_ingest=debug,info"),
            2 => EnvFilter::new("docs_ingest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_cache(config: &Config) -> anyhow::Result<Arc<PageCache>> {
    let path = Path::new(&config.cache.database_path);
    let cache = PageCache::open(path)
        .with_context(|| format!("Failed to open page cache at {}", path.display()))?;
    tracing::info!("Page cache opened with {} pages", cache.len());
    Ok(Arc::new(cache))
}

fn build_coordinator(
    config: &Config,
    cache: Arc<PageCache>,
    no_index: bool,
    max_pages: Option<usize>,
) -> anyhow::Result<Arc<Coordinator>> {
    let indexer: Arc<dyn Indexer> = if no_index {
        Arc::new(NoopIndexer)
    } else {
        Arc::new(TracingIndexer)
    };

    let coordinator = Coordinator::new(config, cache)
        .context("Failed to set up the crawler")?
        .with_indexer(indexer);

    let coordinator = match max_pages {
        Some(limit) => {
            tracing::info!("Page limit set to {}", limit);
            coordinator.with_max_pages(Some(limit))
        }
        None => coordinator,
    };
    Ok(Arc::new(coordinator))
}

/// Cancels the coordinator's current run when Ctrl-C is received
fn cancel_on_ctrl_c(coordinator: Arc<Coordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, cancelling the current run");
            coordinator.cancel();
        }
    })
}

/// Handles the crawl subcommand
async fn handle_crawl(
    config: &Config,
    max_pages: Option<usize>,
    no_index: bool,
) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    let coordinator = build_coordinator(config, cache, no_index, max_pages)?;

    tracing::info!(
        "Crawling {} under {}{}",
        config.crawler.root_urls.join(", "),
        config.scope.host,
        config.scope.base_path
    );

    let ctrl_c = cancel_on_ctrl_c(Arc::clone(&coordinator));
    let result = coordinator.crawl().await;
    ctrl_c.abort();

    let summary = result.context("Crawl failed")?;
    print_crawl_summary(&summary);
    Ok(())
}

/// Handles the refresh subcommand
async fn handle_refresh(config: &Config, no_index: bool) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    if cache.is_empty() {
        tracing::warn!("Page cache is empty; run a full crawl first");
    }
    let coordinator = build_coordinator(config, cache, no_index, None)?;

    let ctrl_c = cancel_on_ctrl_c(Arc::clone(&coordinator));
    let result = coordinator.refresh().await;
    ctrl_c.abort();

    let summary = result.context("Refresh failed")?;
    print_crawl_summary(&summary);
    Ok(())
}

/// Handles the serve subcommand: runs the refresh scheduler until Ctrl-C
async fn handle_serve(config: &Config, refresh_now: bool) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    let coordinator = build_coordinator(config, cache, false, None)?;
    let scheduler = RefreshScheduler::from_config(Arc::clone(&coordinator), &config.scheduler)
        .context("Invalid scheduler configuration")?;

    if config.scheduler.enabled {
        scheduler.start();
    } else {
        tracing::info!("Daily refresh is disabled in the configuration");
    }

    if refresh_now {
        let result = scheduler.trigger_manual();
        tracing::info!("{}", result.message());
    }

    print_scheduler_status(&scheduler.status());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    scheduler.stop().await;
    if scheduler.is_refresh_in_progress() {
        coordinator.cancel();
        scheduler.wait_for_idle().await;
    }

    print_scheduler_status(&scheduler.status());
    Ok(())
}

/// Handles the check-config subcommand: shows the validated configuration
fn handle_check_config(config: &Config) {
    println!("=== Docs-Ingest Configuration ===\n");

    println!("Crawler Configuration:");
    match config.crawler.max_pages {
        Some(limit) => println!("  Max pages per full crawl: {}", limit),
        None => println!("  Max pages per full crawl: unlimited"),
    }
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Requests per second: {}",
        config.crawler.requests_per_second
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!(
        "  Shutdown grace period: {}s",
        config.crawler.shutdown_grace_secs
    );

    println!("\nScope:");
    println!("  Host: {}", config.scope.host);
    println!("  Base path: {}", config.scope.base_path);
    println!("  Exclusions ({}):", config.scope.exclude.len());
    for pattern in &config.scope.exclude {
        println!("    - {}", pattern);
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nCache:");
    println!("  Database: {}", config.cache.database_path);

    println!("\nScheduler:");
    println!("  Enabled: {}", config.scheduler.enabled);
    println!("  Daily refresh at: {}", config.scheduler.refresh_time);

    println!("\nRoot URLs ({}):", config.crawler.root_urls.len());
    for url in &config.crawler.root_urls {
        println!("  - {}", url);
    }
    if let Some(sitemap) = &config.crawler.sitemap_url {
        println!("  Sitemap: {}", sitemap);
    }

    println!("\n✓ Configuration is valid");
}
