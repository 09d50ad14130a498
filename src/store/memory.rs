//! In-memory document store used as a test double and for dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{NewRawRecord, ProcessedRecord, RagError, RawRecord};

use super::DocumentStore;

#[derive(Debug, Default)]
struct Collections {
    raw: Vec<RawRecord>,
    processed: Vec<ProcessedRecord>,
    next_id: i64,
}

/// Mutex-guarded vectors mimicking the SQLite backend's semantics,
/// including monotonically assigned ids.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_raw(&self, records: Vec<NewRawRecord>) -> Result<usize, RagError> {
        let mut guard = self.inner.lock().await;
        let count = records.len();
        for record in records {
            guard.next_id += 1;
            let id = guard.next_id;
            guard.raw.push(RawRecord {
                id,
                url: record.url,
                source: record.source,
                title: record.title,
                text: record.text,
                processed: false,
                inserted_at: Utc::now(),
            });
        }
        Ok(count)
    }

    async fn list_raw(&self) -> Result<Vec<RawRecord>, RagError> {
        Ok(self.inner.lock().await.raw.clone())
    }

    async fn list_unprocessed(&self) -> Result<Vec<RawRecord>, RagError> {
        Ok(self
            .inner
            .lock()
            .await
            .raw
            .iter()
            .filter(|record| !record.processed)
            .cloned()
            .collect())
    }

    async fn list_processed_raw(&self) -> Result<Vec<RawRecord>, RagError> {
        Ok(self
            .inner
            .lock()
            .await
            .raw
            .iter()
            .filter(|record| record.processed)
            .cloned()
            .collect())
    }

    async fn replace_raw(&self, records: Vec<RawRecord>) -> Result<usize, RagError> {
        let mut guard = self.inner.lock().await;
        let count = records.len();
        let max_id = records.iter().map(|record| record.id).max().unwrap_or(0);
        guard.raw = records;
        guard.next_id = guard.next_id.max(max_id);
        Ok(count)
    }

    async fn mark_processed(&self, id: i64) -> Result<(), RagError> {
        let mut guard = self.inner.lock().await;
        match guard.raw.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.processed = true;
                Ok(())
            }
            None => Err(RagError::Store(format!("no raw record with id {id}"))),
        }
    }

    async fn insert_processed(&self, record: ProcessedRecord) -> Result<(), RagError> {
        self.inner.lock().await.processed.push(record);
        Ok(())
    }

    async fn get_processed(&self, id: i64) -> Result<Option<ProcessedRecord>, RagError> {
        Ok(self
            .inner
            .lock()
            .await
            .processed
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn list_processed(&self) -> Result<Vec<ProcessedRecord>, RagError> {
        Ok(self.inner.lock().await.processed.clone())
    }

    async fn count_raw(&self) -> Result<usize, RagError> {
        Ok(self.inner.lock().await.raw.len())
    }

    async fn count_processed(&self) -> Result<usize, RagError> {
        Ok(self.inner.lock().await.processed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[tokio::test]
    async fn insert_assigns_monotonic_ids() {
        let store = MemoryDocumentStore::new();
        store
            .insert_raw(vec![
                NewRawRecord::new("http://a", Source::Github),
                NewRawRecord::new("http://b", Source::Medium),
            ])
            .await
            .unwrap();

        let raw = store.list_raw().await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].id, 1);
        assert_eq!(raw[1].id, 2);
        assert!(raw.iter().all(|record| !record.processed));
    }

    #[tokio::test]
    async fn duplicate_urls_are_appended_as_is() {
        let store = MemoryDocumentStore::new();
        for _ in 0..2 {
            store
                .insert_raw(vec![NewRawRecord::new("http://same", Source::Youtube)])
                .await
                .unwrap();
        }
        assert_eq!(store.count_raw().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_preserves_ids() {
        let store = MemoryDocumentStore::new();
        store
            .insert_raw(vec![NewRawRecord::new("http://a", Source::Github)])
            .await
            .unwrap();

        let mut raw = store.list_raw().await.unwrap();
        raw[0].processed = true;
        store.replace_raw(raw).await.unwrap();

        let raw = store.list_raw().await.unwrap();
        assert_eq!(raw[0].id, 1);
        assert!(raw[0].processed);
    }
}
