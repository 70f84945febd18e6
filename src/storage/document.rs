//! Document-store sink
//!
//! Records are upserted under a SHA-256 of their identity (SKU, else source
//! URL), so re-crawling a product overwrites its document. The REST backend
//! speaks the Firestore v1 `PATCH documents/{collection}/{id}` call.

use crate::config::FirestoreConfig;
use crate::model::ProductRecord;
use crate::storage::keys::document_key;
use crate::storage::traits::{DocumentStore, RecordSink, SinkError, SinkResult, SinkStage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Firestore REST client
pub struct FirestoreRestStore {
    client: Client,
    endpoint: String,
    project_id: String,
    access_token: Option<String>,
}

impl FirestoreRestStore {
    pub fn new(endpoint: &str, project_id: &str, access_token: Option<String>) -> SinkResult<Self> {
        if project_id.trim().is_empty() {
            return Err(SinkError::Config("firestore project id is empty".to_string()));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            access_token,
        })
    }

    pub fn from_config(config: &FirestoreConfig) -> SinkResult<Self> {
        let project_id = config
            .project_id
            .as_deref()
            .ok_or_else(|| SinkError::Config("firestore project id is not set".to_string()))?;
        let endpoint = config.endpoint.as_deref().unwrap_or(FIRESTORE_ENDPOINT);
        Self::new(endpoint, project_id, config.access_token.clone())
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}/{}",
            self.endpoint, self.project_id, collection, id
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreRestStore {
    async fn upsert(&self, collection: &str, id: &str, document: Value) -> SinkResult<()> {
        let url = self.document_url(collection, id);
        let body = json!({ "fields": to_firestore_fields(document) });

        let mut request = self.client.patch(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status {
                service: "firestore",
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(())
    }
}

/// Converts a JSON object into Firestore's typed `fields` map
///
/// Non-object input becomes a single `value` field.
pub fn to_firestore_fields(document: Value) -> Map<String, Value> {
    match document {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, to_firestore_value(value)))
            .collect(),
        other => {
            let mut fields = Map::new();
            fields.insert("value".to_string(), to_firestore_value(other));
            fields
        }
    }
}

fn to_firestore_value(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.into_iter().map(to_firestore_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": to_firestore_fields(value) } }),
    }
}

/// In-process document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<(String, String), Value>>,
    writes: Mutex<usize>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of distinct documents
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upserts received
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upsert(&self, collection: &str, id: &str, document: Value) -> SinkResult<()> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_string(), id.to_string()), document);
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// Upserts records into a document-store collection
pub struct DocumentSink {
    collection: String,
    store: Arc<dyn DocumentStore>,
}

impl DocumentSink {
    pub fn new(collection: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            collection: collection.into(),
            store,
        }
    }

    /// Document id a record is stored under
    pub fn document_id(record: &ProductRecord) -> String {
        document_key(record.identity_key())
    }
}

#[async_trait]
impl RecordSink for DocumentSink {
    fn name(&self) -> &str {
        "firestore"
    }

    fn stage(&self) -> SinkStage {
        SinkStage::Record
    }

    async fn write(&self, record: &mut ProductRecord) -> SinkResult<()> {
        let id = Self::document_id(record);
        let document = serde_json::to_value(&*record)?;
        self.store.upsert(&self.collection, &id, document).await
    }
}
