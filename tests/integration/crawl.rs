use std::sync::Arc;
use std::time::Duration;
use weedeater_crawler::crawler::{
    BackoffController, BackoffPolicy, Coordinator, CrawlComponents, DispatchSettings,
    HttpRenderer, MemoryFrontier,
};
use weedeater_crawler::identity::{RotationPool, UserAgentMode};
use weedeater_crawler::metrics::PrometheusMetrics;
use weedeater_crawler::model::{SeedTarget, TraversalRequest};
use weedeater_crawler::storage::{
    DocumentSink, MemoryDocumentStore, MemoryObjectStore, PersistenceFanout, RawDocumentSink,
    SqliteSnapshotSink,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT_PAGE: &str = r#"
<html><body>
  <nav class="breadcrumbs"><a href="/">Home</a><a href="/c/trimmers">Trimmers</a></nav>
  <h1>  Cordless String Trimmer  </h1>
  <span itemprop="brand">Greenline</span>
  <meta itemprop="sku" content="GL-4012">
  <meta itemprop="price" content="129.99">
  <meta itemprop="priceCurrency" content="USD">
  <link itemprop="availability" href="https://schema.org/InStock">
  <div itemprop="description">A light trimmer for small yards.</div>
  <table class="specs"><tr><th>Voltage</th><td>40 V</td></tr></table>
  <img src="/img/gl-4012.jpg">
</body></html>
"#;

struct Shop {
    server: MockServer,
}

impl Shop {
    async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/c/trimmers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/products/gl-4012">Trimmer</a>
                   <a href="/c/trimmers?page=2">Next</a>
                   <a href="/account/login">Sign in</a>
                   <a href="mailto:help@example.com">Help</a>"#,
            ))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/products/gl-4012"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
            .mount(&server)
            .await;

        Self { server }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.server.uri(), suffix)
    }
}

struct Harness {
    coordinator: Coordinator,
    snapshot: Arc<SqliteSnapshotSink>,
    objects: Arc<MemoryObjectStore>,
    documents: Arc<MemoryDocumentStore>,
    metrics: Arc<PrometheusMetrics>,
}

fn harness(user_agent: &str) -> Harness {
    let snapshot = Arc::new(SqliteSnapshotSink::new_in_memory().unwrap());
    let objects = Arc::new(MemoryObjectStore::new("s3", "raw-pages"));
    let documents = Arc::new(MemoryDocumentStore::new());
    let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());

    let fanout = PersistenceFanout::new()
        .with_sink(snapshot.clone())
        .with_sink(Arc::new(DocumentSink::new("weedeater_products", documents.clone())))
        .with_sink(Arc::new(RawDocumentSink::new("s3", objects.clone(), "weedeater/")));

    let policy = BackoffPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        rate_limit_delay: Duration::from_millis(10),
        ..BackoffPolicy::default()
    };

    let components = CrawlComponents {
        frontier: Arc::new(MemoryFrontier::new()),
        renderer: Arc::new(HttpRenderer::new(Duration::from_secs(5)).unwrap()),
        rotation: Arc::new(RotationPool::new(UserAgentMode::Fixed(user_agent.to_string()), "")),
        backoff: Arc::new(BackoffController::new(policy)),
        fanout: Arc::new(fanout),
        events: metrics.clone(),
    };

    let settings = DispatchSettings {
        max_concurrent_requests: 4,
        max_concurrent_per_domain: 2,
        download_delay: Duration::from_millis(5),
    };

    Harness {
        coordinator: Coordinator::new(settings, components),
        snapshot,
        objects,
        documents,
        metrics,
    }
}

fn seed(url: &str) -> TraversalRequest {
    let yaml = format!(
        "url: {}\nsite: greenline\nallow_patterns: [\"/c/\", \"/products/\"]\n",
        url
    );
    let target: SeedTarget = serde_yaml::from_str(&yaml).unwrap();
    TraversalRequest::listing(target.url.clone(), target.context())
}

#[tokio::test]
async fn test_full_crawl_persists_products_to_every_sink() {
    let shop = Shop::start().await;
    let h = harness("WeedeaterTest/1.0");

    let report = h.coordinator.run(vec![seed(&shop.url("/c/trimmers"))]).await;

    // Listing, its second page, and the product; login and mailto links are filtered
    assert_eq!(report.requests_processed, 3);
    assert_eq!(report.records_extracted, 1);
    assert_eq!(report.sink_failures, 0);

    let product_url = shop.url("/products/gl-4012");
    let stored = h.snapshot.latest_for_url(&product_url).unwrap().unwrap();
    assert_eq!(stored.site.as_deref(), Some("greenline"));
    assert_eq!(stored.sku.as_deref(), Some("GL-4012"));
    assert_eq!(stored.price.as_deref(), Some("129.99"));
    assert_eq!(stored.currency.as_deref(), Some("USD"));
    assert_eq!(stored.availability.as_deref(), Some("InStock"));

    let raw_ref = stored.raw_html_path.unwrap();
    assert!(raw_ref.starts_with("s3://raw-pages/weedeater/"));
    assert!(raw_ref.ends_with(".html"));
    assert_eq!(h.objects.len(), 1);
    let key = raw_ref.trim_start_matches("s3://raw-pages/");
    let object = h.objects.get(key).unwrap();
    assert!(String::from_utf8_lossy(&object.bytes).contains("Cordless String Trimmer"));

    assert_eq!(h.documents.len(), 1);

    assert_eq!(h.metrics.pages_crawled(), 3);
    assert_eq!(h.metrics.items_scraped(), 1);
    assert_eq!(h.metrics.crawl_failures(), 0);
}

#[tokio::test]
async fn test_rotated_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/trimmers"))
        .and(header("user-agent", "WeedeaterTest/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>empty</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness("WeedeaterTest/2.0");
    let report = h
        .coordinator
        .run(vec![seed(&format!("{}/c/trimmers", server.uri()))])
        .await;

    assert_eq!(report.requests_processed, 1);
    assert_eq!(report.requests_dropped, 0);
}

#[tokio::test]
async fn test_rate_limited_listing_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/c/trimmers"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/c/trimmers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/products/gl-4012">x</a>"#))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products/gl-4012"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .mount(&server)
        .await;

    let h = harness("WeedeaterTest/1.0");
    let report = h
        .coordinator
        .run(vec![seed(&format!("{}/c/trimmers", server.uri()))])
        .await;

    assert_eq!(report.requests_retried, 2);
    assert_eq!(report.requests_dropped, 0);
    assert_eq!(report.records_extracted, 1);
    assert_eq!(h.snapshot.count().unwrap(), 1);
}

#[tokio::test]
async fn test_persistent_server_errors_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/trimmers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness("WeedeaterTest/1.0");
    let report = h
        .coordinator
        .run(vec![seed(&format!("{}/c/trimmers", server.uri()))])
        .await;

    assert_eq!(report.requests_processed, 4);
    assert_eq!(report.requests_retried, 3);
    assert_eq!(report.requests_dropped, 1);
    assert_eq!(h.metrics.crawl_failures(), 1);
    assert_eq!(h.snapshot.count().unwrap(), 0);
}
