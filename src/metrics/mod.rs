//! Crawl lifecycle events and Prometheus metrics
//!
//! Components report lifecycle events through the `CrawlEvents` trait.
//! `PrometheusMetrics` turns them into counters and a frontier-size gauge and
//! can serve them on `/metrics`.
//!
//! # Failure policy
//!
//! Metrics never affect the crawl: registration, bind and serve errors are
//! logged and otherwise ignored.

use crate::model::ProductRecord;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receiver of crawl lifecycle events
///
/// Called synchronously from concurrent crawl tasks.
pub trait CrawlEvents: Send + Sync {
    /// A crawl session started
    fn on_session_opened(&self);

    /// A request was accepted into the frontier
    fn on_request_scheduled(&self, url: &str);

    /// A request was abandoned for good
    fn on_request_dropped(&self, url: &str, reason: &str);

    /// A product page produced a record
    fn on_record_extracted(&self, record: &ProductRecord);

    /// Approximate number of outstanding frontier requests
    fn set_frontier_size(&self, size: usize);
}

/// Event sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl CrawlEvents for NoopEvents {
    fn on_session_opened(&self) {}
    fn on_request_scheduled(&self, _url: &str) {}
    fn on_request_dropped(&self, _url: &str, _reason: &str) {}
    fn on_record_extracted(&self, _record: &ProductRecord) {}
    fn set_frontier_size(&self, _size: usize) {}
}

/// Prometheus-backed event sink with its own registry
pub struct PrometheusMetrics {
    registry: Registry,
    pages_crawled: IntCounter,
    items_scraped: IntCounter,
    crawl_failures: IntCounter,
    frontier_size: IntGauge,
    port: Option<u16>,
    server_started: AtomicBool,
}

impl PrometheusMetrics {
    /// Registers the crawl metrics
    ///
    /// # Arguments
    ///
    /// * `port` - Port for the `/metrics` listener started on session open;
    ///   `None` keeps the metrics in process only
    pub fn new(port: Option<u16>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let pages_crawled = IntCounter::new(
            "weedeater_pages_crawled",
            "Requests scheduled for crawling",
        )?;
        let items_scraped = IntCounter::new(
            "weedeater_items_scraped",
            "Product records extracted",
        )?;
        let crawl_failures = IntCounter::new(
            "weedeater_crawl_failures",
            "Requests dropped after exhausting retries",
        )?;
        let frontier_size = IntGauge::new(
            "weedeater_frontier_size",
            "Requests waiting in the frontier",
        )?;

        registry.register(Box::new(pages_crawled.clone()))?;
        registry.register(Box::new(items_scraped.clone()))?;
        registry.register(Box::new(crawl_failures.clone()))?;
        registry.register(Box::new(frontier_size.clone()))?;

        Ok(Self {
            registry,
            pages_crawled,
            items_scraped,
            crawl_failures,
            frontier_size,
            port,
            server_started: AtomicBool::new(false),
        })
    }

    /// Renders all metrics in the Prometheus text format
    pub fn encode(&self) -> String {
        encode_registry(&self.registry)
    }

    pub fn pages_crawled(&self) -> u64 {
        self.pages_crawled.get()
    }

    pub fn items_scraped(&self) -> u64 {
        self.items_scraped.get()
    }

    pub fn crawl_failures(&self) -> u64 {
        self.crawl_failures.get()
    }

    pub fn frontier_size(&self) -> i64 {
        self.frontier_size.get()
    }

    fn start_server(&self, port: u16) {
        if self.server_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; metrics endpoint not started");
            return;
        };

        let registry = self.registry.clone();
        runtime.spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::warn!("Metrics endpoint unavailable on {}: {}", addr, e);
                    return;
                }
            };

            let app = Router::new().route(
                "/metrics",
                get(move || {
                    let registry = registry.clone();
                    async move { encode_registry(&registry) }
                }),
            );

            tracing::info!("Serving metrics on http://{}/metrics", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!("Metrics endpoint stopped: {}", e);
            }
        });
    }
}

fn encode_registry(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::debug!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

impl CrawlEvents for PrometheusMetrics {
    fn on_session_opened(&self) {
        if let Some(port) = self.port {
            self.start_server(port);
        }
    }

    fn on_request_scheduled(&self, _url: &str) {
        self.pages_crawled.inc();
    }

    fn on_request_dropped(&self, _url: &str, _reason: &str) {
        self.crawl_failures.inc();
    }

    fn on_record_extracted(&self, _record: &ProductRecord) {
        self.items_scraped.inc();
    }

    fn set_frontier_size(&self, size: usize) {
        self.frontier_size.set(size.min(i64::MAX as usize) as i64);
    }
}
