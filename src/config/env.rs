//! Environment variable overrides
//!
//! Deployments configure the crawler through the same variable names the
//! container images have always used. Overrides are applied after the TOML
//! file is parsed and before validation.

use crate::config::types::{Config, UserAgentModeKind};
use crate::ConfigError;
use std::str::FromStr;

/// Applies overrides from the process environment
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides from an arbitrary lookup
///
/// Empty values are treated as unset.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("WEEDEATER_SEEDS_PATH") {
        config.crawler.seeds_path = v;
    }
    if let Some(v) = get("CONCURRENT_REQUESTS") {
        config.crawler.max_concurrent_requests = parse("CONCURRENT_REQUESTS", &v)?;
    }
    if let Some(v) = get("CONCURRENT_REQUESTS_PER_DOMAIN") {
        config.crawler.max_concurrent_per_domain = parse("CONCURRENT_REQUESTS_PER_DOMAIN", &v)?;
    }
    if let Some(v) = get("DOWNLOAD_DELAY") {
        // Seconds, fractional
        let secs: f64 = parse("DOWNLOAD_DELAY", &v)?;
        if secs < 0.0 {
            return Err(invalid("DOWNLOAD_DELAY", &v));
        }
        config.crawler.download_delay_ms = (secs * 1000.0).round() as u64;
    }
    if let Some(v) = get("HEADLESS") {
        config.crawler.headless = flag(&v);
    }

    if let Some(v) = get("USER_AGENT_MODE") {
        config.identity.user_agent_mode = match v.to_lowercase().as_str() {
            "fixed" => UserAgentModeKind::Fixed,
            "random" => UserAgentModeKind::Random,
            _ => return Err(invalid("USER_AGENT_MODE", &v)),
        };
    }
    if let Some(v) = get("FIXED_USER_AGENT") {
        config.identity.fixed_user_agent = Some(v);
    }
    if let Some(v) = get("PROXY_POOL") {
        config.identity.proxy_pool = Some(v);
    }

    if let Some(v) = get("ENABLE_SQLITE") {
        config.sqlite.enabled = flag(&v);
    }
    if let Some(v) = get("SQLITE_PATH") {
        config.sqlite.path = v;
    }

    if let Some(v) = get("ENABLE_FIRESTORE") {
        config.firestore.enabled = flag(&v);
    }
    if let Some(v) = get("FIRESTORE_COLLECTION") {
        config.firestore.collection = v;
    }
    if let Some(v) = get("FIREBASE_PROJECT_ID") {
        config.firestore.project_id = Some(v);
    }
    if let Some(v) = get("FIRESTORE_ACCESS_TOKEN") {
        config.firestore.access_token = Some(v);
    }

    if let Some(v) = get("ENABLE_S3") {
        config.s3.enabled = flag(&v);
    }
    if let Some(v) = get("AWS_S3_BUCKET") {
        config.s3.bucket = Some(v);
    }
    if let Some(v) = get("S3_PREFIX") {
        config.s3.prefix = v;
    }
    if let Some(v) = get("AWS_REGION") {
        config.s3.region = v;
    }
    if let Some(v) = get("S3_ENDPOINT") {
        config.s3.endpoint = Some(v);
    }

    if let Some(v) = get("ENABLE_GCS") {
        config.gcs.enabled = flag(&v);
    }
    if let Some(v) = get("GCS_BUCKET") {
        config.gcs.bucket = Some(v);
    }
    if let Some(v) = get("GCS_PREFIX") {
        config.gcs.prefix = v;
    }
    if let Some(v) = get("GCS_ENDPOINT") {
        config.gcs.endpoint = Some(v);
    }

    if let Some(v) = get("PROMETHEUS_PORT") {
        config.metrics.port = parse("PROMETHEUS_PORT", &v)?;
    }

    Ok(())
}

fn flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidOverride {
        name: name.to_string(),
        value: value.to_string(),
    }
}
