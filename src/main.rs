//! Weedeater main entry point
//!
//! This is the command-line interface for the Weedeater product crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use weedeater_crawler::config::{
    load_config_with_hash, load_default_config, load_seeds, Config, UserAgentModeKind,
};
use weedeater_crawler::crawler::run_crawl;
use weedeater_crawler::identity::parse_proxy_pool;
use weedeater_crawler::storage::SqliteSnapshotSink;
use tracing_subscriber::EnvFilter;

/// Weedeater: a schema-targeted e-commerce product crawler
///
/// Weedeater walks seed listing pages, follows product links, extracts
/// structured product records and writes them to every configured sink.
#[derive(Parser, Debug)]
#[command(name = "weedeater")]
#[command(version)]
#[command(about = "A schema-targeted e-commerce product crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults plus environment when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Seed file to use instead of the configured one
    #[arg(long, value_name = "PATH")]
    seeds: Option<PathBuf>,

    /// Validate config and seeds, then show what would be crawled
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the SQLite snapshot and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults and environment");
            load_default_config().context("invalid configuration from environment")?
        }
    };

    if let Some(seeds) = &cli.seeds {
        config.crawler.seeds_path = seeds.display().to_string();
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "weedeater_crawler=info,weedeater=info,warn",
            1 => "weedeater_crawler=debug,weedeater=debug,info",
            2 => "weedeater_crawler=trace,weedeater=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Handles the --dry-run mode: validates config and seeds without fetching
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Weedeater Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrent requests: {}", config.crawler.max_concurrent_requests);
    println!("  Per domain: {}", config.crawler.max_concurrent_per_domain);
    println!("  Download delay: {}ms", config.crawler.download_delay_ms);
    println!("  Navigation timeout: {}s", config.crawler.navigation_timeout_secs);

    println!("\nRetry:");
    println!("  {} for {:?}", enabled(config.retry.enabled), config.retry.http_codes);
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  429 default delay: {}s", config.rate_limit.default_delay_secs);

    println!("\nIdentity:");
    match config.identity.user_agent_mode {
        UserAgentModeKind::Fixed => println!(
            "  User agent: fixed ({})",
            config.identity.fixed_user_agent.as_deref().unwrap_or("-")
        ),
        UserAgentModeKind::Random => println!("  User agent: random"),
    }
    let proxies = config
        .identity
        .proxy_pool
        .as_deref()
        .map_or(0, |pool| parse_proxy_pool(pool).len());
    println!("  Proxies: {}", proxies);

    println!("\nSinks:");
    println!("  SQLite: {} ({})", enabled(config.sqlite.enabled), config.sqlite.path);
    println!(
        "  Firestore: {} ({})",
        enabled(config.firestore.enabled),
        config.firestore.collection
    );
    println!(
        "  S3: {} ({})",
        enabled(config.s3.enabled),
        config.s3.bucket.as_deref().unwrap_or("-")
    );
    println!(
        "  GCS: {} ({})",
        enabled(config.gcs.enabled),
        config.gcs.bucket.as_deref().unwrap_or("-")
    );
    println!("  Metrics: {} (port {})", enabled(config.metrics.enabled), config.metrics.port);

    let seeds = load_seeds(Path::new(&config.crawler.seeds_path))?;
    println!("\nSeeds ({}):", seeds.len());
    for seed in &seeds {
        let site = seed.site.as_deref().unwrap_or("-");
        println!("  - {} [{}]", seed.url, site);
        if !seed.allow_patterns.is_empty() {
            println!("    allow: {}", seed.allow_patterns.join(", "));
        }
        if !seed.deny_patterns.is_empty() {
            println!("    deny: {}", seed.deny_patterns.join(", "));
        }
        if seed.scroll_to_load {
            println!("    scroll to load");
        }
        if let Some(login) = &seed.login {
            let present = std::env::var(&login.password_env).is_ok();
            println!(
                "    login via {} ({})",
                login.password_env,
                if present { "set" } else { "MISSING" }
            );
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", seeds.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the SQLite snapshot
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.sqlite.path);

    let sink = SqliteSnapshotSink::new(Path::new(&config.sqlite.path))
        .with_context(|| format!("failed to open {}", config.sqlite.path))?;
    let stats = sink.stats()?;

    println!("Products stored: {}", stats.total);

    println!("\nBy site:");
    for (site, count) in &stats.by_site {
        println!("  {:<40} {}", site, count);
    }

    println!("\nBy availability:");
    for (availability, count) in &stats.by_availability {
        println!("  {:<40} {}", availability, count);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!("Seeds: {}", config.crawler.seeds_path);

    match run_crawl(config).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed: {} records from {} requests",
                report.records_extracted,
                report.requests_processed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
