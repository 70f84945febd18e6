//! Persistence fan-out
//!
//! Writes each record to every configured sink. Raw-document sinks run first
//! because they rewrite the record's raw-document reference that the other
//! sinks store. A failing sink is logged and reported; it never stops the
//! remaining sinks and never fails the call.

use crate::config::Config;
use crate::model::ProductRecord;
use crate::storage::document::{DocumentSink, FirestoreRestStore};
use crate::storage::object::{HttpObjectStore, RawDocumentSink};
use crate::storage::sqlite::SqliteSnapshotSink;
use crate::storage::traits::{RecordSink, SinkError, SinkResult, SinkStage};
use std::path::Path;
use std::sync::Arc;

/// Result of one sink's write
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: Result<(), SinkError>,
}

impl SinkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened to one record across all sinks
#[derive(Debug)]
pub struct PersistReport {
    /// The record as finally stored, raw document released
    pub record: ProductRecord,
    pub outcomes: Vec<SinkOutcome>,
}

impl PersistReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }

    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|o| o.sink == sink)
    }
}

/// Ordered set of record sinks
#[derive(Default)]
pub struct PersistenceFanout {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl PersistenceFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink; sinks of the same stage run in the order added
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Builds every sink enabled in the configuration
    ///
    /// Raw-document uploads go to S3 then GCS, so with both enabled the GCS
    /// URI is the one recorded.
    ///
    /// # Returns
    ///
    /// * `Err(SinkError)` - An enabled sink could not be initialized
    pub fn from_config(config: &Config) -> SinkResult<Self> {
        let mut fanout = Self::new();

        if config.s3.enabled {
            let store = Arc::new(HttpObjectStore::s3(&config.s3)?);
            fanout = fanout.with_sink(Arc::new(RawDocumentSink::new("s3", store, config.s3.prefix.clone())));
        }
        if config.gcs.enabled {
            let store = Arc::new(HttpObjectStore::gcs(&config.gcs)?);
            fanout = fanout.with_sink(Arc::new(RawDocumentSink::new("gcs", store, config.gcs.prefix.clone())));
        }
        if config.sqlite.enabled {
            let sink = SqliteSnapshotSink::new(Path::new(&config.sqlite.path))?;
            fanout = fanout.with_sink(Arc::new(sink));
        }
        if config.firestore.enabled {
            let store = Arc::new(FirestoreRestStore::from_config(&config.firestore)?);
            fanout = fanout.with_sink(Arc::new(DocumentSink::new(
                config.firestore.collection.clone(),
                store,
            )));
        }

        tracing::info!("Persistence sinks: {:?}", fanout.sink_names());
        Ok(fanout)
    }

    /// Sink names in execution order
    pub fn sink_names(&self) -> Vec<String> {
        self.ordered().map(|sink| sink.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Writes the record to every sink and reports each outcome
    ///
    /// The raw document is released once all sinks have run, whatever the
    /// outcomes were.
    pub async fn persist(&self, mut record: ProductRecord) -> PersistReport {
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for sink in self.ordered() {
            let result = sink.write(&mut record).await;
            if let Err(e) = &result {
                tracing::warn!(
                    "{} sink failed for {}: {}",
                    sink.name(),
                    record.source_url,
                    e
                );
            }
            outcomes.push(SinkOutcome {
                sink: sink.name().to_string(),
                result,
            });
        }

        record.raw_document = None;
        PersistReport { record, outcomes }
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn RecordSink>> {
        let raw = self
            .sinks
            .iter()
            .filter(|s| s.stage() == SinkStage::RawDocument);
        let rest = self.sinks.iter().filter(|s| s.stage() == SinkStage::Record);
        raw.chain(rest)
    }
}
