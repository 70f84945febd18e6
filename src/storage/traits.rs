//! Sink traits and error types
//!
//! This module defines the interfaces persistence backends implement and the
//! errors they report. Sink errors never escape `PersistenceFanout::persist`;
//! they are collected per sink and logged.

use crate::model::ProductRecord;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while writing to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status} for {url}")]
    Status {
        service: &'static str,
        status: u16,
        url: String,
    },

    #[error("Sink misconfigured: {0}")]
    Config(String),

    #[error("Sink lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// When a sink runs relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SinkStage {
    /// Uploads raw documents and rewrites the record's reference; runs first
    RawDocument,
    /// Stores the record as it stands after the raw-document stage
    Record,
}

/// A persistence destination for product records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Name used in logs and persist reports
    fn name(&self) -> &str;

    fn stage(&self) -> SinkStage;

    /// Writes one record; a write is atomic for that record
    async fn write(&self, record: &mut ProductRecord) -> SinkResult<()>;
}

/// Object storage for raw page bytes
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads bytes under a key, overwriting any existing object
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> SinkResult<()>;

    /// Storage URI recorded on the product record, e.g. `s3://bucket/key`
    fn uri(&self, key: &str) -> String;
}

/// Document database keyed by caller-supplied identifiers
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates or replaces the document `id` in `collection`
    async fn upsert(&self, collection: &str, id: &str, document: Value) -> SinkResult<()>;
}
