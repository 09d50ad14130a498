//! Document store backends for raw and processed records.
//!
//! The [`DocumentStore`] trait abstracts the collection-oriented store the
//! pipeline writes to, so the drivers can be wired against the SQLite
//! backend in production and the in-memory backend in tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::types::{NewRawRecord, ProcessedRecord, RagError, RawRecord};

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Collection-oriented store holding the raw collection and its
/// processed-record mirror.
///
/// Raw inserts append without deduplication; duplicate URLs across runs are
/// accepted as-is. Identity is assigned by the store on insert.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append records to the raw collection, returning how many were written.
    async fn insert_raw(&self, records: Vec<NewRawRecord>) -> Result<usize, RagError>;

    /// Every record in the raw collection, in insertion order.
    async fn list_raw(&self) -> Result<Vec<RawRecord>, RagError>;

    /// Raw records that have not been processed yet.
    async fn list_unprocessed(&self) -> Result<Vec<RawRecord>, RagError>;

    /// Raw records already marked processed.
    async fn list_processed_raw(&self) -> Result<Vec<RawRecord>, RagError>;

    /// Full-table rewrite of the raw collection, preserving record ids.
    ///
    /// This replaces the entire collection contents in one transaction; it
    /// is how the transform stage commits its output.
    async fn replace_raw(&self, records: Vec<RawRecord>) -> Result<usize, RagError>;

    /// Flip a single raw record to processed. At most once per record; a
    /// record that is already processed stays processed.
    async fn mark_processed(&self, id: i64) -> Result<(), RagError>;

    /// Write a processed-record mirror. The mirror is immutable thereafter.
    async fn insert_processed(&self, record: ProcessedRecord) -> Result<(), RagError>;

    /// Look up a processed-record mirror by raw record id.
    async fn get_processed(&self, id: i64) -> Result<Option<ProcessedRecord>, RagError>;

    /// All processed-record mirrors.
    async fn list_processed(&self) -> Result<Vec<ProcessedRecord>, RagError>;

    /// Size of the raw collection.
    async fn count_raw(&self) -> Result<usize, RagError>;

    /// Size of the processed-record mirror collection.
    async fn count_processed(&self) -> Result<usize, RagError>;
}
