//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the components together:
//! - Seeding the frontier and dispatching requests under global and
//!   per-domain concurrency limits
//! - Spacing requests to the same domain by the download delay
//! - Consulting the backoff controller on every response and fetch error
//! - Routing pages to listing classification or product extraction
//! - Persisting records and reporting lifecycle events
//!
//! The crawl ends when the frontier is empty and no request is in flight or
//! waiting on a retry delay.

use crate::config::{load_seeds, Config, CrawlerConfig};
use crate::crawler::{
    classify_listing, extract_product, seed_requests, BackoffController, BackoffDecision,
    BackoffPolicy, Frontier, HttpRenderer, MemoryFrontier, PageRenderer, RenderedPage,
};
use crate::identity::RotationPool;
use crate::metrics::{CrawlEvents, NoopEvents, PrometheusMetrics};
use crate::model::{Stage, TraversalRequest};
use crate::storage::PersistenceFanout;
use crate::url::extract_domain;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use url::Url;

/// Dispatch limits taken from the `[crawler]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub max_concurrent_requests: usize,
    pub max_concurrent_per_domain: usize,
    pub download_delay: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests.max(1) as usize,
            max_concurrent_per_domain: config.max_concurrent_per_domain.max(1) as usize,
            download_delay: Duration::from_millis(config.download_delay_ms),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Everything the coordinator dispatches through
pub struct CrawlComponents {
    pub frontier: Arc<dyn Frontier>,
    pub renderer: Arc<dyn PageRenderer>,
    pub rotation: Arc<RotationPool>,
    pub backoff: Arc<BackoffController>,
    pub fanout: Arc<PersistenceFanout>,
    pub events: Arc<dyn CrawlEvents>,
}

/// Totals for one crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Fetch attempts, retries included
    pub requests_processed: u64,
    pub records_extracted: u64,
    pub requests_retried: u64,
    pub requests_dropped: u64,
    /// Individual sink writes that failed
    pub sink_failures: u64,
}

impl CrawlReport {
    fn absorb(&mut self, other: CrawlReport) {
        self.requests_processed += other.requests_processed;
        self.records_extracted += other.records_extracted;
        self.requests_retried += other.requests_retried;
        self.requests_dropped += other.requests_dropped;
        self.sink_failures += other.sink_failures;
    }
}

/// Concurrency slot and request spacing for one domain
struct DomainSlot {
    semaphore: Arc<Semaphore>,
    next_allowed: Mutex<Instant>,
}

struct DomainSlots {
    slots: Mutex<HashMap<String, Arc<DomainSlot>>>,
    per_domain: usize,
    delay: Duration,
}

impl DomainSlots {
    fn new(per_domain: usize, delay: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            per_domain,
            delay,
        }
    }

    /// Waits for a free slot on the URL's domain and for its download delay
    async fn acquire(&self, url: &str) -> Option<OwnedSemaphorePermit> {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| extract_domain(&u))
            .unwrap_or_default();

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .entry(domain)
                .or_insert_with(|| {
                    Arc::new(DomainSlot {
                        semaphore: Arc::new(Semaphore::new(self.per_domain)),
                        next_allowed: Mutex::new(Instant::now()),
                    })
                })
                .clone()
        };

        let permit = slot.semaphore.clone().acquire_owned().await.ok();

        let wait = {
            let mut next = slot.next_allowed.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let start = (*next).max(now);
            *next = start + self.delay;
            start - now
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        permit
    }
}

struct Shared {
    components: CrawlComponents,
    domains: DomainSlots,
}

impl Shared {
    /// Enqueues a request and reports it as scheduled when accepted
    fn schedule(&self, request: TraversalRequest) -> bool {
        let url = request.url.clone();
        let accepted = self.components.frontier.push(request);
        if accepted {
            self.components.events.on_request_scheduled(&url);
        }
        self.report_frontier_size();
        accepted
    }

    fn report_frontier_size(&self) {
        let frontier = &self.components.frontier;
        self.components
            .events
            .set_frontier_size(frontier.len() + frontier.delayed());
    }

    /// Fetches one request and acts on the result
    async fn process(&self, request: TraversalRequest) -> CrawlReport {
        let mut report = CrawlReport {
            requests_processed: 1,
            ..CrawlReport::default()
        };

        let identity = request
            .identity
            .clone()
            .unwrap_or_else(|| self.components.rotation.next_identity());

        let rendered = {
            let _domain_permit = self.domains.acquire(&request.url).await;
            tracing::debug!("Fetching {} ({})", request.url, request.stage.as_str());
            self.components.renderer.render(&request, &identity).await
        };

        let (decision, status) = match rendered {
            Ok(page) => match self.components.backoff.decide(&request.url, &page) {
                BackoffDecision::Proceed => {
                    self.handle_page(&request, page, &mut report).await;
                    return report;
                }
                decision => (decision, Some(page.status)),
            },
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", request.url, e);
                (self.components.backoff.decide_error(&request.url), None)
            }
        };

        match decision {
            BackoffDecision::Retry { delay, attempt } => {
                match status {
                    Some(429) => tracing::warn!(
                        "Rate limited (429) on {}, retrying in {:?} (attempt {})",
                        request.url,
                        delay,
                        attempt
                    ),
                    Some(code) => tracing::info!(
                        "HTTP {} on {}, retrying in {:?} (attempt {})",
                        code,
                        request.url,
                        delay,
                        attempt
                    ),
                    None => tracing::info!(
                        "Retrying {} in {:?} (attempt {})",
                        request.url,
                        delay,
                        attempt
                    ),
                }
                self.components.frontier.push_after(request.for_retry(), delay);
                self.components.events.on_request_scheduled(&request.url);
                report.requests_retried += 1;
            }
            BackoffDecision::GiveUp { attempts } => {
                let reason = match status {
                    Some(code) => format!("HTTP {}", code),
                    None => "fetch error".to_string(),
                };
                tracing::warn!(
                    "Dropping {} after {} retries ({})",
                    request.url,
                    attempts,
                    reason
                );
                self.components.events.on_request_dropped(&request.url, &reason);
                report.requests_dropped += 1;
            }
            BackoffDecision::Proceed => {}
        }

        self.report_frontier_size();
        report
    }

    async fn handle_page(&self, request: &TraversalRequest, page: RenderedPage, report: &mut CrawlReport) {
        match request.stage {
            Stage::Listing => {
                let follow = classify_listing(&page, &request.context);
                let total = follow.len();
                let mut accepted = 0;
                for next in follow {
                    if self.schedule(next) {
                        accepted += 1;
                    }
                }
                tracing::debug!(
                    "{}: {} follow-up requests, {} new",
                    request.url,
                    total,
                    accepted
                );
            }
            Stage::Product => {
                let record = extract_product(&page, &request.context);
                self.components.events.on_record_extracted(&record);
                report.records_extracted += 1;

                let persisted = self.components.fanout.persist(record).await;
                report.sink_failures += persisted.failures() as u64;
                tracing::info!(
                    "Extracted {} ({})",
                    persisted.record.source_url,
                    persisted
                        .record
                        .product_name
                        .as_deref()
                        .unwrap_or("unnamed product")
                );
            }
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    settings: DispatchSettings,
    shared: Arc<Shared>,
}

impl Coordinator {
    pub fn new(settings: DispatchSettings, components: CrawlComponents) -> Self {
        let domains = DomainSlots::new(settings.max_concurrent_per_domain, settings.download_delay);
        Self {
            settings,
            shared: Arc::new(Shared {
                components,
                domains,
            }),
        }
    }

    /// Runs the crawl loop from the given seed requests until no work remains
    pub async fn run(&self, seeds: Vec<TraversalRequest>) -> CrawlReport {
        let shared = &self.shared;
        let frontier = Arc::clone(&shared.components.frontier);

        shared.components.events.on_session_opened();
        tracing::info!("Starting crawl with {} seed requests", seeds.len());
        for seed in seeds {
            shared.schedule(seed);
        }

        let global = Arc::new(Semaphore::new(self.settings.max_concurrent_requests));
        let mut tasks: JoinSet<CrawlReport> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, String> = HashMap::new();
        let mut report = CrawlReport::default();
        let start_time = std::time::Instant::now();

        loop {
            while let Some(request) = frontier.pop() {
                shared.report_frontier_size();
                let Ok(permit) = Arc::clone(&global).acquire_owned().await else {
                    break;
                };
                let task_shared = Arc::clone(shared);
                let url = request.url.clone();
                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    task_shared.process(request).await
                });
                in_flight.insert(handle.id(), url);
            }

            if tasks.is_empty() && frontier.is_idle() {
                break;
            }

            tokio::select! {
                Some(joined) = tasks.join_next_with_id() => match joined {
                    Ok((id, outcome)) => {
                        in_flight.remove(&id);
                        report.absorb(outcome);
                        if report.requests_processed % 50 == 0 {
                            tracing::info!(
                                "Progress: {} requests processed, {} records, {} in frontier",
                                report.requests_processed,
                                report.records_extracted,
                                frontier.len() + frontier.delayed()
                            );
                        }
                    }
                    Err(e) => {
                        let url = in_flight.remove(&e.id()).unwrap_or_default();
                        tracing::error!("Crawl task for {} failed: {}", url, e);
                        shared.components.events.on_request_dropped(&url, "task failed");
                        report.requests_dropped += 1;
                    }
                },
                _ = frontier.changed() => {}
            }
        }

        shared.components.events.set_frontier_size(0);
        tracing::info!(
            "Crawl complete in {:.1}s: {} requests, {} records, {} retries, {} dropped, {} sink failures",
            start_time.elapsed().as_secs_f64(),
            report.requests_processed,
            report.records_extracted,
            report.requests_retried,
            report.requests_dropped,
            report.sink_failures
        );
        report
    }
}

/// Runs a complete crawl from configuration
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the seed file and resolve login secrets
/// 2. Initialize every enabled sink
/// 3. Build the renderer, rotation pool, backoff controller and metrics
/// 4. Run the crawl loop
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl ran to completion
/// * `Err(CrawlError)` - Seeds or a sink could not be initialized
///
/// # Example
///
/// ```no_run
/// use weedeater_crawler::config::load_config;
/// use weedeater_crawler::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("weedeater.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} records", report.records_extracted);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> crate::Result<CrawlReport> {
    let seeds = load_seeds(Path::new(&config.crawler.seeds_path))?;
    let requests = seed_requests(&seeds, |name| std::env::var(name).ok())?;

    let fanout = PersistenceFanout::from_config(&config)?;
    let renderer = HttpRenderer::new(Duration::from_secs(config.crawler.navigation_timeout_secs))?;
    if !config.crawler.headless {
        tracing::debug!("headless = false has no effect on the HTTP renderer");
    }

    let events: Arc<dyn CrawlEvents> = if config.metrics.enabled {
        match PrometheusMetrics::new(Some(config.metrics.port)) {
            Ok(metrics) => Arc::new(metrics),
            Err(e) => {
                tracing::warn!("Metrics disabled: {}", e);
                Arc::new(NoopEvents)
            }
        }
    } else {
        Arc::new(NoopEvents)
    };

    let components = CrawlComponents {
        frontier: Arc::new(MemoryFrontier::new()),
        renderer: Arc::new(renderer),
        rotation: Arc::new(RotationPool::from_config(&config.identity)),
        backoff: Arc::new(BackoffController::new(BackoffPolicy::from_config(
            &config.retry,
            &config.rate_limit,
        ))),
        fanout: Arc::new(fanout),
        events,
    };

    let coordinator = Coordinator::new(DispatchSettings::from_config(&config.crawler), components);
    Ok(coordinator.run(requests).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchError;
    use crate::identity::{RequestIdentity, UserAgentMode};
    use crate::model::TraversalContext;
    use crate::storage::{MemoryDocumentStore, DocumentSink};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Serves queued responses per URL; the last response repeats
    struct ScriptedRenderer {
        pages: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
        seen_agents: Mutex<Vec<String>>,
    }

    impl ScriptedRenderer {
        fn new(pages: &[(&str, &[(u16, &str)])]) -> Self {
            let pages = pages
                .iter()
                .map(|(url, responses)| {
                    let queue = responses
                        .iter()
                        .map(|(status, body)| (*status, body.to_string()))
                        .collect();
                    (url.to_string(), queue)
                })
                .collect();
            Self {
                pages: Mutex::new(pages),
                seen_agents: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for ScriptedRenderer {
        async fn render(
            &self,
            request: &TraversalRequest,
            identity: &RequestIdentity,
        ) -> Result<RenderedPage, FetchError> {
            self.seen_agents.lock().unwrap().push(identity.user_agent.clone());
            if request.url.ends_with("/panic") {
                panic!("renderer crashed on {}", request.url);
            }
            let mut pages = self.pages.lock().unwrap();
            let queue = pages
                .get_mut(&request.url)
                .ok_or_else(|| FetchError::Network(format!("no route to {}", request.url)))?;
            let (status, body) = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            Ok(RenderedPage::new(request.url.clone(), status, body))
        }
    }

    fn components(
        renderer: Arc<ScriptedRenderer>,
        documents: Arc<MemoryDocumentStore>,
        metrics: Arc<PrometheusMetrics>,
    ) -> CrawlComponents {
        let policy = BackoffPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            rate_limit_delay: Duration::from_millis(5),
            ..BackoffPolicy::default()
        };
        CrawlComponents {
            frontier: Arc::new(MemoryFrontier::new()),
            renderer,
            rotation: Arc::new(RotationPool::new(
                UserAgentMode::Fixed("WeedeaterTest/1.0".to_string()),
                "",
            )),
            backoff: Arc::new(BackoffController::new(policy)),
            fanout: Arc::new(
                PersistenceFanout::new().with_sink(Arc::new(DocumentSink::new("products", documents))),
            ),
            events: metrics,
        }
    }

    fn fast_settings() -> DispatchSettings {
        DispatchSettings {
            max_concurrent_requests: 4,
            max_concurrent_per_domain: 2,
            download_delay: Duration::ZERO,
        }
    }

    const LISTING: &str = r#"<a href="/products/a">A</a><a href="/products/b">B</a><a href="/c/2">Next</a>"#;
    const LISTING_2: &str = r#"<a href="/products/a">A again</a><a href="/c/1">Back</a>"#;
    const PRODUCT: &str = r#"<h1>Trimmer</h1><meta itemprop="sku" content="SKU">"#;

    #[tokio::test]
    async fn test_listing_to_products() {
        let renderer = Arc::new(ScriptedRenderer::new(&[
            ("https://shop.example.com/c/1", &[(200, LISTING)]),
            ("https://shop.example.com/c/2", &[(200, LISTING_2)]),
            ("https://shop.example.com/products/a", &[(200, "<h1>A</h1>")]),
            ("https://shop.example.com/products/b", &[(200, "<h1>B</h1>")]),
        ]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer.clone(), documents.clone(), metrics.clone()),
        );

        let seed = TraversalRequest::listing("https://shop.example.com/c/1", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.requests_processed, 4);
        assert_eq!(report.records_extracted, 2);
        assert_eq!(report.requests_dropped, 0);
        assert_eq!(documents.len(), 2);
        assert_eq!(metrics.pages_crawled(), 4);
        assert_eq!(metrics.items_scraped(), 2);
        assert_eq!(metrics.frontier_size(), 0);
        assert!(renderer
            .seen_agents
            .lock()
            .unwrap()
            .iter()
            .all(|ua| ua == "WeedeaterTest/1.0"));
    }

    #[tokio::test]
    async fn test_rate_limited_request_retried_then_extracted() {
        let renderer = Arc::new(ScriptedRenderer::new(&[(
            "https://shop.example.com/products/a",
            &[(429, ""), (503, ""), (200, PRODUCT)],
        )]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer, documents.clone(), metrics.clone()),
        );

        let seed = TraversalRequest::product("https://shop.example.com/products/a", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.requests_processed, 3);
        assert_eq!(report.requests_retried, 2);
        assert_eq!(report.records_extracted, 1);
        assert_eq!(documents.len(), 1);
        assert_eq!(metrics.crawl_failures(), 0);
        // The seed plus each re-entry after a retry
        assert_eq!(metrics.pages_crawled(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_dropped() {
        let renderer = Arc::new(ScriptedRenderer::new(&[(
            "https://shop.example.com/c/1",
            &[(429, "")],
        )]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer, documents.clone(), metrics.clone()),
        );

        let seed = TraversalRequest::listing("https://shop.example.com/c/1", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.requests_processed, 3);
        assert_eq!(report.requests_retried, 2);
        assert_eq!(report.requests_dropped, 1);
        assert_eq!(metrics.crawl_failures(), 1);
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_errors_are_retried_then_dropped() {
        let renderer = Arc::new(ScriptedRenderer::new(&[]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer, documents, metrics.clone()),
        );

        let seed = TraversalRequest::listing("https://unreachable.example.com/", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.requests_retried, 2);
        assert_eq!(report.requests_dropped, 1);
        assert_eq!(metrics.crawl_failures(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_page_still_processed() {
        let renderer = Arc::new(ScriptedRenderer::new(&[(
            "https://shop.example.com/products/gone",
            &[(404, "<h1>Not found</h1>")],
        )]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer, documents.clone(), metrics),
        );

        let seed = TraversalRequest::product("https://shop.example.com/products/gone", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.records_extracted, 1);
        assert_eq!(report.requests_retried, 0);
    }

    #[tokio::test]
    async fn test_crashed_task_reported_as_dropped() {
        let renderer = Arc::new(ScriptedRenderer::new(&[
            ("https://shop.example.com/c/1", &[(200, r#"<a href="/c/panic">x</a>"#)]),
        ]));
        let documents = Arc::new(MemoryDocumentStore::new());
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let coordinator = Coordinator::new(
            fast_settings(),
            components(renderer, documents, metrics.clone()),
        );

        let seed = TraversalRequest::listing("https://shop.example.com/c/1", TraversalContext::default());
        let report = coordinator.run(vec![seed]).await;

        assert_eq!(report.requests_processed, 1);
        assert_eq!(report.requests_dropped, 1);
        assert_eq!(metrics.crawl_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_delay_spaces_same_domain() {
        let slots = DomainSlots::new(4, Duration::from_millis(500));
        let start = Instant::now();

        let _a = slots.acquire("https://shop.example.com/a").await;
        let _b = slots.acquire("https://shop.example.com/b").await;
        let _other = slots.acquire("https://other.example.com/a").await;

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn test_dispatch_settings_from_config() {
        let settings = DispatchSettings::from_config(&CrawlerConfig::default());
        assert_eq!(settings.max_concurrent_requests, 8);
        assert_eq!(settings.max_concurrent_per_domain, 4);
        assert_eq!(settings.download_delay, Duration::from_millis(500));
    }
}
