use crate::config::types::{
    Config, CrawlerConfig, FirestoreConfig, IdentityConfig, ObjectStoreConfig, RetryConfig,
    SqliteConfig, UserAgentModeKind,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_identity_config(&config.identity)?;
    validate_sqlite_config(&config.sqlite)?;
    validate_firestore_config(&config.firestore)?;
    validate_object_store_config("s3", &config.s3)?;
    validate_object_store_config("gcs", &config.gcs)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_concurrent_per_domain < 1
        || config.max_concurrent_per_domain > config.max_concurrent_requests
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_per_domain must be between 1 and max_concurrent_requests ({}), got {}",
            config.max_concurrent_requests, config.max_concurrent_per_domain
        )));
    }

    if config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.seeds_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "seeds_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if let Some(code) = config
        .http_codes
        .iter()
        .find(|code| !(400..=599).contains(*code))
    {
        return Err(ConfigError::Validation(format!(
            "retry http_codes must be 4xx or 5xx statuses, got {}",
            code
        )));
    }

    if config.multiplier < 1.0 || !config.multiplier.is_finite() {
        return Err(ConfigError::Validation(format!(
            "retry multiplier must be >= 1.0, got {}",
            config.multiplier
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates identity rotation configuration
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agent_mode == UserAgentModeKind::Fixed
        && config
            .fixed_user_agent
            .as_deref()
            .map_or(true, |ua| ua.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "user_agent_mode = fixed requires fixed_user_agent".to_string(),
        ));
    }

    if let Some(pool) = &config.proxy_pool {
        for proxy in crate::identity::parse_proxy_pool(pool) {
            Url::parse(&proxy)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        }
    }

    Ok(())
}

fn validate_sqlite_config(config: &SqliteConfig) -> Result<(), ConfigError> {
    if config.enabled && config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sqlite path cannot be empty when the sink is enabled".to_string(),
        ));
    }
    Ok(())
}

fn validate_firestore_config(config: &FirestoreConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.collection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "firestore collection cannot be empty".to_string(),
        ));
    }

    if config
        .project_id
        .as_deref()
        .map_or(true, |id| id.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "firestore project_id is required when the sink is enabled".to_string(),
        ));
    }

    if let Some(endpoint) = &config.endpoint {
        Url::parse(endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid firestore endpoint '{}': {}", endpoint, e))
        })?;
    }

    Ok(())
}

fn validate_object_store_config(name: &str, config: &ObjectStoreConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config
        .bucket
        .as_deref()
        .map_or(true, |bucket| bucket.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "{} bucket is required when the sink is enabled",
            name
        )));
    }

    // Uploads are bearer-authenticated PUTs, which the public cloud APIs
    // reject; an explicit gateway endpoint is required.
    let endpoint = config
        .endpoint
        .as_deref()
        .filter(|endpoint| !endpoint.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::Validation(format!(
                "{} endpoint is required when the sink is enabled (a gateway accepting bearer auth)",
                name
            ))
        })?;
    Url::parse(endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid {} endpoint '{}': {}", name, endpoint, e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = Config::default();
        config.crawler.max_concurrent_requests = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.crawler.max_concurrent_per_domain = 9;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_retry_codes_must_be_errors() {
        let mut config = Config::default();
        config.retry.http_codes = vec![200, 503];
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_retry_delays() {
        let mut config = Config::default();
        config.retry.multiplier = 0.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.retry.base_delay_ms = 120_000;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_fixed_user_agent_requires_value() {
        let mut config = Config::default();
        config.identity.user_agent_mode = UserAgentModeKind::Fixed;
        assert!(validate(&config).is_err());

        config.identity.fixed_user_agent = Some("WeedeaterBot/1.0".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let mut config = Config::default();
        config.identity.proxy_pool = Some("http://ok.example.net:8080, not a url".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_object_store_requires_explicit_endpoint() {
        for name in ["s3", "gcs"] {
            let mut config = Config::default();
            let store = if name == "s3" { &mut config.s3 } else { &mut config.gcs };
            store.enabled = true;
            store.bucket = Some("raw-pages".to_string());

            match validate(&config) {
                Err(ConfigError::Validation(message)) => {
                    assert!(message.contains(name) && message.contains("endpoint"))
                }
                other => panic!("expected endpoint rejection for {}, got {:?}", name, other),
            }

            let store = if name == "s3" { &mut config.s3 } else { &mut config.gcs };
            store.endpoint = Some("not a url".to_string());
            assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

            let store = if name == "s3" { &mut config.s3 } else { &mut config.gcs };
            store.endpoint = Some("https://objects.internal.example.com".to_string());
            assert!(validate(&config).is_ok());
        }
    }

    #[test]
    fn test_enabled_sinks_require_destination() {
        let mut config = Config::default();
        config.s3.enabled = true;
        assert!(validate(&config).is_err());
        config.s3.bucket = Some("raw-pages".to_string());
        config.s3.endpoint = Some("http://localhost:9000".to_string());
        assert!(validate(&config).is_ok());

        let mut config = Config::default();
        config.firestore.enabled = true;
        assert!(validate(&config).is_err());
        config.firestore.project_id = Some("weedeater-prod".to_string());
        assert!(validate(&config).is_ok());

        let mut config = Config::default();
        config.sqlite.path = String::new();
        assert!(validate(&config).is_err());
        config.sqlite.enabled = false;
        assert!(validate(&config).is_ok());
    }
}
