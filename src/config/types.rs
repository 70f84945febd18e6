use serde::Deserialize;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub identity: IdentityConfig,
    pub sqlite: SqliteConfig,
    pub firestore: FirestoreConfig,
    pub s3: ObjectStoreConfig,
    pub gcs: ObjectStoreConfig,
    pub metrics: MetricsConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of requests in flight
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Maximum number of requests in flight per domain
    #[serde(rename = "max-concurrent-per-domain")]
    pub max_concurrent_per_domain: u32,

    /// Delay before each request to the same domain (milliseconds)
    #[serde(rename = "download-delay-ms")]
    pub download_delay_ms: u64,

    /// Page navigation timeout (seconds)
    #[serde(rename = "navigation-timeout-secs")]
    pub navigation_timeout_secs: u64,

    /// Path to the YAML seed file
    #[serde(rename = "seeds-path")]
    pub seeds_path: String,

    /// Run the browser driver headless
    pub headless: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 8,
            max_concurrent_per_domain: 4,
            download_delay_ms: 500,
            navigation_timeout_secs: 90,
            seeds_path: "seeds/weedeater_targets.yaml".to_string(),
            headless: true,
        }
    }
}

/// Generic retry policy for non-2xx responses
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,

    /// Status codes that trigger a retry
    #[serde(rename = "http-codes")]
    pub http_codes: Vec<u16>,

    /// Retries allowed per logical request
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first generic retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound for generic retry delays (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive retry delays
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_codes: vec![429, 500, 502, 503, 504, 522, 524],
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

/// HTTP 429 handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Delay used when the server sends no usable Retry-After (seconds)
    #[serde(rename = "default-delay-secs")]
    pub default_delay_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: 2,
        }
    }
}

/// User agent selection mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAgentModeKind {
    #[default]
    Random,
    Fixed,
}

/// Request identity rotation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    #[serde(rename = "user-agent-mode")]
    pub user_agent_mode: UserAgentModeKind,

    #[serde(rename = "fixed-user-agent")]
    pub fixed_user_agent: Option<String>,

    /// Comma-separated proxy URLs
    #[serde(rename = "proxy-pool")]
    pub proxy_pool: Option<String>,
}

/// Relational snapshot sink
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data/weedeater.sqlite".to_string(),
        }
    }
}

/// Document-store sink
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirestoreConfig {
    pub enabled: bool,
    pub collection: String,

    #[serde(rename = "project-id")]
    pub project_id: Option<String>,

    /// OAuth access token sent as a bearer credential
    #[serde(rename = "access-token")]
    pub access_token: Option<String>,

    /// Override for the REST endpoint (emulators, tests)
    pub endpoint: Option<String>,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collection: "weedeater_products".to_string(),
            project_id: None,
            access_token: None,
            endpoint: None,
        }
    }
}

/// Raw-document object storage sink (S3 or GCS)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub enabled: bool,
    pub bucket: Option<String>,

    /// Key prefix for uploaded documents
    pub prefix: String,

    /// Region; only meaningful for S3
    pub region: String,

    /// Override for the upload endpoint
    pub endpoint: Option<String>,

    #[serde(rename = "access-token")]
    pub access_token: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: None,
            prefix: "weedeater/".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_token: None,
        }
    }
}

/// Metrics exposition
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8008,
        }
    }
}
