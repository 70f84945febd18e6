//! Raw-document object storage
//!
//! Raw page bytes are uploaded with a plain HTTP PUT to an S3- or
//! GCS-compatible endpoint (path-style `{endpoint}/{bucket}/{key}`), with an
//! optional bearer token. Requests are not SigV4-signed, so the endpoint must
//! be a gateway or emulator that accepts bearer auth; there is no default
//! pointing at the public cloud APIs. `MemoryObjectStore` keeps objects in
//! process.

use crate::config::ObjectStoreConfig;
use crate::model::ProductRecord;
use crate::storage::keys::raw_document_key;
use crate::storage::traits::{ObjectStore, RecordSink, SinkError, SinkResult, SinkStage};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Content type used for raw page uploads
pub const RAW_DOCUMENT_CONTENT_TYPE: &str = "text/html";

/// Object store reached over HTTP PUT
pub struct HttpObjectStore {
    client: Client,
    scheme: &'static str,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
}

impl HttpObjectStore {
    /// Creates a store; `scheme` is used for the recorded URI (`s3`, `gs`)
    pub fn new(
        scheme: &'static str,
        endpoint: &str,
        bucket: &str,
        access_token: Option<String>,
    ) -> SinkResult<Self> {
        if bucket.trim().is_empty() {
            return Err(SinkError::Config(format!("{} bucket is empty", scheme)));
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            scheme,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_token,
        })
    }

    /// S3 store from the `[s3]` section
    pub fn s3(config: &ObjectStoreConfig) -> SinkResult<Self> {
        tracing::debug!("S3 region {} (informational for gateway endpoints)", config.region);
        Self::new("s3", endpoint(config)?, bucket(config)?, config.access_token.clone())
    }

    /// GCS store from the `[gcs]` section
    pub fn gcs(config: &ObjectStoreConfig) -> SinkResult<Self> {
        Self::new("gs", endpoint(config)?, bucket(config)?, config.access_token.clone())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

fn endpoint(config: &ObjectStoreConfig) -> SinkResult<&str> {
    config
        .endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| SinkError::Config("object store endpoint is not set".to_string()))
}

fn bucket(config: &ObjectStoreConfig) -> SinkResult<&str> {
    config
        .bucket
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| SinkError::Config("object store bucket is not set".to_string()))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> SinkResult<()> {
        let url = self.object_url(key);
        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status {
                service: "object store",
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(())
    }

    fn uri(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }
}

/// An object held by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process object store
pub struct MemoryObjectStore {
    scheme: &'static str,
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(scheme: &'static str, bucket: impl Into<String>) -> Self {
        Self {
            scheme,
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> SinkResult<()> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }

    fn uri(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }
}

/// Uploads a record's raw document and points the record at it
pub struct RawDocumentSink {
    name: String,
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl RawDocumentSink {
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl RecordSink for RawDocumentSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> SinkStage {
        SinkStage::RawDocument
    }

    async fn write(&self, record: &mut ProductRecord) -> SinkResult<()> {
        let Some(raw) = &record.raw_document else {
            return Ok(());
        };

        let key = raw_document_key(&self.prefix, &record.source_url, raw.captured_at);
        self.store
            .put(&key, raw.bytes.clone(), RAW_DOCUMENT_CONTENT_TYPE)
            .await?;

        let uri = self.store.uri(&key);
        tracing::debug!("Uploaded raw document for {} to {}", record.source_url, uri);
        record.raw_document_ref = Some(uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawDocument;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record_with_raw() -> ProductRecord {
        let captured_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut record = ProductRecord::new("https://shop.example.com/p/1", captured_at);
        record.raw_document = Some(RawDocument {
            bytes: b"<html>x</html>".to_vec(),
            url: record.source_url.clone(),
            captured_at,
        });
        record
    }

    #[tokio::test]
    async fn test_http_put_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/raw-pages/weedeater/obj.html"))
            .and(header("content-type", "text/html"))
            .and(header("authorization", "Bearer t0ken"))
            .and(body_string("<html>x</html>"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpObjectStore::new("s3", &server.uri(), "raw-pages", Some("t0ken".to_string())).unwrap();
        store
            .put("weedeater/obj.html", b"<html>x</html>".to_vec(), "text/html")
            .await
            .unwrap();
        assert_eq!(store.uri("weedeater/obj.html"), "s3://raw-pages/weedeater/obj.html");
    }

    #[tokio::test]
    async fn test_http_put_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new("gs", &server.uri(), "raw-pages", None).unwrap();
        let result = store.put("k.html", Vec::new(), "text/html").await;
        assert!(matches!(result, Err(SinkError::Status { status: 403, .. })));
    }

    #[test]
    fn test_config_constructors() {
        let mut config = ObjectStoreConfig::default();
        assert!(HttpObjectStore::s3(&config).is_err());

        config.bucket = Some("raw-pages".to_string());
        // No implicit public-cloud endpoint
        assert!(matches!(HttpObjectStore::s3(&config), Err(SinkError::Config(_))));
        assert!(matches!(HttpObjectStore::gcs(&config), Err(SinkError::Config(_))));

        config.endpoint = Some("http://minio.internal:9000/".to_string());
        let s3 = HttpObjectStore::s3(&config).unwrap();
        assert_eq!(s3.object_url("k.html"), "http://minio.internal:9000/raw-pages/k.html");
        assert_eq!(s3.uri("k.html"), "s3://raw-pages/k.html");

        let gcs = HttpObjectStore::gcs(&config).unwrap();
        assert_eq!(gcs.uri("k.html"), "gs://raw-pages/k.html");
    }

    #[tokio::test]
    async fn test_raw_sink_rewrites_reference() {
        let store = Arc::new(MemoryObjectStore::new("s3", "raw-pages"));
        let sink = RawDocumentSink::new("s3", store.clone(), "weedeater/");
        let mut record = record_with_raw();

        sink.write(&mut record).await.unwrap();

        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("weedeater/1700000000_"));
        assert_eq!(
            record.raw_document_ref,
            Some(format!("s3://raw-pages/{}", keys[0]))
        );

        let stored = store.get(&keys[0]).unwrap();
        assert_eq!(stored.bytes, b"<html>x</html>");
        assert_eq!(stored.content_type, "text/html");
    }

    #[tokio::test]
    async fn test_raw_sink_skips_records_without_document() {
        let store = Arc::new(MemoryObjectStore::new("s3", "raw-pages"));
        let sink = RawDocumentSink::new("s3", store.clone(), "weedeater/");
        let mut record = ProductRecord::new("https://shop.example.com/p/1", Utc::now());

        sink.write(&mut record).await.unwrap();
        assert!(store.is_empty());
        assert!(record.raw_document_ref.is_none());
    }
}
