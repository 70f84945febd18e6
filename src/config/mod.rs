//! Configuration module
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file, layering environment overrides on top, and loading the YAML seed list.
//!
//! # Example
//!
//! ```no_run
//! use weedeater_crawler::config::{load_config, load_seeds};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("weedeater.toml")).unwrap();
//! let seeds = load_seeds(Path::new(&config.crawler.seeds_path)).unwrap();
//! println!("{} seeds, sqlite enabled: {}", seeds.len(), config.sqlite.enabled);
//! ```

mod env;
mod parser;
mod seeds;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FirestoreConfig, IdentityConfig, MetricsConfig, ObjectStoreConfig,
    RateLimitConfig, RetryConfig, SqliteConfig, UserAgentModeKind,
};

pub use env::{apply_env_overrides, apply_overrides};
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_default_config, parse_config,
};
pub use seeds::{load_seeds, parse_seeds};
pub use validation::validate;
