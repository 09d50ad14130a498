//! ETL stages: extract, transform, load.
//!
//! Wiring order is Extract×4 (order-independent among themselves), then
//! Transform, then Load. Each extract step pairs one source adapter with
//! the raw store writer; transform is a full-table rewrite; load is a
//! reporting stub over the processed rows.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::sources::SourceAdapter;
use crate::store::DocumentStore;
use crate::types::{RagError, RawRecord};

use super::{Pipeline, Step, StepOutcome};

/// Extract step: fetch from one adapter and append to the raw collection.
pub struct ExtractStep {
    name: String,
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn DocumentStore>,
}

impl ExtractStep {
    pub fn new(adapter: Arc<dyn SourceAdapter>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: format!("extract_{}", adapter.source()),
            adapter,
            store,
        }
    }
}

#[async_trait]
impl Step for ExtractStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<StepOutcome, RagError> {
        let records = self.adapter.fetch().await?;
        let count = self.store.insert_raw(records).await?;
        info!(source = %self.adapter.source(), count, "fetched records");
        Ok(StepOutcome::records(count))
    }
}

/// A pluggable cleaning/enrichment rule applied to each raw record during
/// transform, before it is marked processed.
pub trait TransformRule: Send + Sync {
    fn apply(&self, record: &mut RawRecord);
}

/// Transform step: full-table rewrite of the raw collection.
///
/// Reads every raw record, applies the configured rules, sets
/// `processed = true`, and replaces the collection contents. Running it
/// twice leaves the same content as running it once.
pub struct TransformStage {
    store: Arc<dyn DocumentStore>,
    rules: Vec<Arc<dyn TransformRule>>,
}

impl TransformStage {
    /// Stage with no rules: records pass through and are only flagged.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            rules: Vec::new(),
        }
    }

    /// Append a transformation rule; rules run in registration order.
    #[must_use]
    pub fn rule(mut self, rule: Arc<dyn TransformRule>) -> Self {
        self.rules.push(rule);
        self
    }
}

#[async_trait]
impl Step for TransformStage {
    fn name(&self) -> &str {
        "transform"
    }

    async fn run(&self) -> Result<StepOutcome, RagError> {
        let mut records = self.store.list_raw().await?;
        for record in &mut records {
            for rule in &self.rules {
                rule.apply(record);
            }
            record.processed = true;
        }
        let count = self.store.replace_raw(records).await?;
        Ok(StepOutcome::records(count))
    }
}

/// Destination the load stage reports each processed record to.
pub trait LoadSink: Send + Sync {
    fn report(&self, record: &RawRecord);
}

/// Default sink: one structured log event per record.
struct TracingSink;

impl LoadSink for TracingSink {
    fn report(&self, record: &RawRecord) {
        info!(id = record.id, url = %record.url, source = %record.source, "stored record");
    }
}

/// Load step: report every processed record to the configured sink.
///
/// Real downstream delivery is out of scope; the default sink only makes
/// the processed rows visible in the log.
pub struct LoadStage {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn LoadSink>,
}

impl LoadStage {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the log sink, e.g. with a collector in tests.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LoadSink>) -> Self {
        self.sink = sink;
        self
    }
}

#[async_trait]
impl Step for LoadStage {
    fn name(&self) -> &str {
        "load"
    }

    async fn run(&self) -> Result<StepOutcome, RagError> {
        let records = self.store.list_processed_raw().await?;
        for record in &records {
            self.sink.report(record);
        }
        Ok(StepOutcome::records(records.len()))
    }
}

/// Wires the full ETL pipeline: one extract step per adapter, then
/// transform, then load, all against the same document store.
pub fn etl_pipeline(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<dyn DocumentStore>,
) -> Pipeline {
    let mut pipeline = Pipeline::new();
    for adapter in adapters {
        pipeline = pipeline.step(Arc::new(ExtractStep::new(adapter, Arc::clone(&store))));
    }
    pipeline
        .step(Arc::new(TransformStage::new(Arc::clone(&store))))
        .step(Arc::new(LoadStage::new(store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use crate::types::{NewRawRecord, Source};

    #[tokio::test]
    async fn transform_marks_everything_and_is_idempotent() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(vec![
                NewRawRecord::new("http://a", Source::Github),
                NewRawRecord::new("http://b", Source::Medium),
            ])
            .await
            .unwrap();

        let stage = TransformStage::new(store.clone());
        let first = stage.run().await.unwrap();
        assert_eq!(first.count, 2);
        let after_first = store.list_raw().await.unwrap();
        assert!(after_first.iter().all(|record| record.processed));

        let second = stage.run().await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(store.list_raw().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn transform_applies_rules_before_flagging() {
        struct TrimTitle;
        impl TransformRule for TrimTitle {
            fn apply(&self, record: &mut RawRecord) {
                if let Some(title) = &mut record.title {
                    *title = title.trim().to_string();
                }
            }
        }

        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(vec![
                NewRawRecord::new("http://a", Source::Github).with_title("  padded  "),
            ])
            .await
            .unwrap();

        let stage = TransformStage::new(store.clone()).rule(Arc::new(TrimTitle));
        stage.run().await.unwrap();

        let records = store.list_raw().await.unwrap();
        assert_eq!(records[0].title.as_deref(), Some("padded"));
        assert!(records[0].processed);
    }

    #[tokio::test]
    async fn load_reports_processed_rows_only() {
        struct Collector(std::sync::Mutex<Vec<String>>);

        impl LoadSink for Collector {
            fn report(&self, record: &RawRecord) {
                self.0.lock().unwrap().push(record.url.clone());
            }
        }

        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(vec![
                NewRawRecord::new("http://x", Source::Github),
                NewRawRecord::new("http://b", Source::Youtube),
            ])
            .await
            .unwrap();
        store.mark_processed(1).await.unwrap();

        let collector = Arc::new(Collector(std::sync::Mutex::new(Vec::new())));
        let outcome = LoadStage::new(store)
            .sink(collector.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.count, 1);
        assert_eq!(*collector.0.lock().unwrap(), vec!["http://x".to_string()]);
    }
}
