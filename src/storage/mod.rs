//! Storage module for persisting product records
//!
//! This module handles every persistence destination, including:
//! - The SQLite snapshot table
//! - Raw-document object storage (S3, GCS)
//! - The document store (Firestore)
//! - The fan-out that writes a record to all of them

mod document;
mod fanout;
mod keys;
mod object;
mod schema;
mod sqlite;
mod traits;

pub use document::{to_firestore_fields, DocumentSink, FirestoreRestStore, MemoryDocumentStore};
pub use fanout::{PersistReport, PersistenceFanout, SinkOutcome};
pub use keys::{document_key, raw_document_key, sha256_hex};
pub use object::{
    HttpObjectStore, MemoryObjectStore, RawDocumentSink, StoredObject, RAW_DOCUMENT_CONTENT_TYPE,
};
pub use schema::initialize_schema;
pub use sqlite::{SnapshotStats, SqliteSnapshotSink, StoredProduct};
pub use traits::{DocumentStore, ObjectStore, RecordSink, SinkError, SinkResult, SinkStage};
