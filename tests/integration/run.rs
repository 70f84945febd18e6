use tempfile::TempDir;
use weedeater_crawler::config::Config;
use weedeater_crawler::crawler::run_crawl;
use weedeater_crawler::storage::SqliteSnapshotSink;
use weedeater_crawler::{ConfigError, CrawlError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir, seeds_yaml: &str) -> Config {
    let seeds_path = dir.path().join("seeds.yaml");
    std::fs::write(&seeds_path, seeds_yaml).unwrap();

    let mut config = Config::default();
    config.crawler.seeds_path = seeds_path.display().to_string();
    config.crawler.download_delay_ms = 0;
    config.sqlite.path = dir.path().join("data/products.sqlite").display().to_string();
    config.metrics.enabled = false;
    config
}

#[tokio::test]
async fn test_run_crawl_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/trimmers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/products/a">A</a><a href="/products/b">B</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Trimmer A</h1>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Trimmer B</h1>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &dir,
        &format!("- url: {}/c/trimmers\n  site: greenline\n", server.uri()),
    );
    let sqlite_path = config.sqlite.path.clone();

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.requests_processed, 3);
    assert_eq!(report.records_extracted, 2);
    assert_eq!(report.sink_failures, 0);

    let snapshot = SqliteSnapshotSink::new(std::path::Path::new(&sqlite_path)).unwrap();
    let stats = snapshot.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_site, vec![("greenline".to_string(), 2)]);
}

#[tokio::test]
async fn test_empty_seed_file_crawls_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, "");

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.requests_processed, 0);
}

#[tokio::test]
async fn test_missing_seed_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, "");
    config.crawler.seeds_path = dir.path().join("missing.yaml").display().to_string();

    let result = run_crawl(config).await;
    assert!(matches!(
        result,
        Err(CrawlError::Config(ConfigError::Seeds { .. }))
    ));
}

#[tokio::test]
async fn test_missing_login_secret_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &dir,
        r##"
- url: https://shop.example.com/account
  login:
    email: buyer@example.com
    password_env: WEEDEATER_TEST_UNSET_PASSWORD_9F31
    email_selector: "#email"
    password_selector: "#password"
    submit_selector: "button[type=submit]"
"##,
    );

    let result = run_crawl(config).await;
    match result {
        Err(CrawlError::Config(ConfigError::Validation(message))) => {
            assert!(message.contains("WEEDEATER_TEST_UNSET_PASSWORD_9F31"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|r| r.records_extracted)),
    }
}
