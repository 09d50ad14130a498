//! Featurization job: embed unprocessed raw records and index the vectors.
//!
//! One run walks `SELECT_UNPROCESSED -> (EMBED -> INDEX -> MARK_PROCESSED)*
//! -> DONE`. A failure embedding or indexing any record aborts the run;
//! records already committed stay committed. Re-running after a full pass
//! is a no-op because every record is processed at most once.

use std::sync::Arc;

use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::index::{Distance, VectorIndex};
use crate::store::DocumentStore;
use crate::types::{PointPayload, ProcessedRecord, RagError, VectorPoint};

/// Run options for [`FeaturizationJob`].
#[derive(Clone, Copy, Debug)]
pub struct FeaturizeOptions {
    /// Destructively recreate the vector collection before embedding.
    ///
    /// This loses every previously indexed point; it is off by default and
    /// callers must opt in deliberately.
    pub reset_index: bool,
    /// Metric declared when `reset_index` recreates the collection.
    pub metric: Distance,
}

impl Default for FeaturizeOptions {
    fn default() -> Self {
        Self {
            reset_index: false,
            metric: Distance::Cosine,
        }
    }
}

/// Summary of one featurization run.
#[derive(Clone, Debug, Default)]
pub struct FeaturizationReport {
    /// Records embedded, indexed, and mirrored during this run. Zero means
    /// the run was a no-op (nothing unprocessed).
    pub processed: usize,
}

impl FeaturizationReport {
    pub fn is_noop(&self) -> bool {
        self.processed == 0
    }
}

/// Drives embedding and indexing of unprocessed raw records.
///
/// Dependencies are injected so tests can substitute the in-memory store,
/// index, and mock provider.
pub struct FeaturizationJob {
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: FeaturizeOptions,
}

impl FeaturizationJob {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: FeaturizeOptions,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            options,
        }
    }

    /// Execute one run to completion.
    pub async fn run(&self) -> Result<FeaturizationReport, RagError> {
        if self.options.reset_index {
            warn!(
                dimension = self.embedder.dimension(),
                "recreating vector collection; all prior points will be lost"
            );
            self.index
                .reset(self.embedder.dimension(), self.options.metric)
                .await?;
        } else {
            self.index
                .ensure(self.embedder.dimension(), self.options.metric)
                .await?;
        }

        let unprocessed = self.store.list_unprocessed().await?;
        if unprocessed.is_empty() {
            info!("no new raw data to process");
            return Ok(FeaturizationReport::default());
        }

        info!(
            count = unprocessed.len(),
            embedder = self.embedder.name(),
            "featurizing unprocessed records"
        );

        let mut processed = 0usize;
        for record in unprocessed {
            let text = record.embedding_text().to_string();
            let vector = self.embedder.embed(&text).await?;

            self.index
                .upsert(VectorPoint {
                    id: record.id,
                    vector,
                    payload: PointPayload {
                        source: record.source,
                    },
                })
                .await?;

            self.store
                .insert_processed(ProcessedRecord {
                    id: record.id,
                    text,
                    embedding_id: record.id.to_string(),
                    source: record.source,
                    processed: true,
                })
                .await?;
            self.store.mark_processed(record.id).await?;
            processed += 1;
        }

        info!(processed, "featurization run complete");
        Ok(FeaturizationReport { processed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::index::MemoryVectorIndex;
    use crate::store::MemoryDocumentStore;
    use crate::types::{NewRawRecord, Source};
    use async_trait::async_trait;

    fn job(
        store: Arc<MemoryDocumentStore>,
        index: Arc<MemoryVectorIndex>,
        options: FeaturizeOptions,
    ) -> FeaturizationJob {
        FeaturizationJob::new(
            store,
            index,
            Arc::new(MockEmbeddingProvider::new()),
            options,
        )
    }

    #[tokio::test]
    async fn noop_run_reports_zero_and_changes_nothing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let index = Arc::new(MemoryVectorIndex::new());
        index.reset(384, Distance::Cosine).await.unwrap();

        let report = job(store.clone(), index.clone(), FeaturizeOptions::default())
            .run()
            .await
            .unwrap();

        assert!(report.is_noop());
        assert_eq!(store.count_processed().await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn each_record_gets_one_mirror_and_one_point() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(vec![
                NewRawRecord::new("http://a", Source::Github),
                NewRawRecord::new("http://b", Source::Medium).with_text("article body"),
            ])
            .await
            .unwrap();
        let index = Arc::new(MemoryVectorIndex::new());
        index.reset(384, Distance::Cosine).await.unwrap();

        let report = job(store.clone(), index.clone(), FeaturizeOptions::default())
            .run()
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(index.count().await.unwrap(), 2);
        for record in store.list_raw().await.unwrap() {
            assert!(record.processed);
            let mirror = store.get_processed(record.id).await.unwrap().unwrap();
            assert_eq!(mirror.embedding_id, record.id.to_string());
            assert_eq!(mirror.source, record.source);
        }

        // Second run is a no-op.
        let again = job(store.clone(), index.clone(), FeaturizeOptions::default())
            .run()
            .await
            .unwrap();
        assert!(again.is_noop());
        assert_eq!(store.count_processed().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_option_empties_the_collection_first() {
        let store = Arc::new(MemoryDocumentStore::new());
        let index = Arc::new(MemoryVectorIndex::new());
        index.reset(384, Distance::Cosine).await.unwrap();
        index
            .upsert(VectorPoint {
                id: 99,
                vector: vec![0.0; 384],
                payload: PointPayload {
                    source: Source::Github,
                },
            })
            .await
            .unwrap();

        let options = FeaturizeOptions {
            reset_index: true,
            ..Default::default()
        };
        job(store, index.clone(), options).run().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn embed_failure_aborts_the_run() {
        struct FailingProvider;

        #[async_trait]
        impl EmbeddingProvider for FailingProvider {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
                Err(RagError::Model("model is gone".to_string()))
            }

            fn dimension(&self) -> usize {
                384
            }

            fn name(&self) -> &'static str {
                "failing"
            }
        }

        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(vec![NewRawRecord::new("http://a", Source::Github)])
            .await
            .unwrap();
        let index = Arc::new(MemoryVectorIndex::new());
        index.reset(384, Distance::Cosine).await.unwrap();

        let failing = FeaturizationJob::new(
            store.clone(),
            index.clone(),
            Arc::new(FailingProvider),
            FeaturizeOptions::default(),
        );
        assert!(matches!(failing.run().await, Err(RagError::Model(_))));

        // Nothing was committed for the failed record.
        assert_eq!(store.count_processed().await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(store.list_unprocessed().await.unwrap().len(), 1);
    }
}
