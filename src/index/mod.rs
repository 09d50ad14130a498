//! Vector index backends for embedding storage and similarity search.
//!
//! [`VectorIndex::reset`] is the only destructive operation in the crate:
//! it drops and recreates the named collection, losing every stored point.
//! Callers opt into it explicitly; upserts are idempotent by id.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{RagError, VectorPoint};

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

/// Distance metric declared when a collection is (re)created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    L2,
}

impl Distance {
    /// SQL function computing this metric in `sqlite-vec`.
    pub fn sql_function(&self) -> &'static str {
        match self {
            Distance::Cosine => "vec_distance_cosine",
            Distance::L2 => "vec_distance_l2",
        }
    }
}

/// A named vector collection supporting destructive recreation, upserts
/// keyed by id, and top-k similarity search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Destructively (re)create the collection with the given dimensionality
    /// and metric. **All prior points are lost.** This is a full reset, not
    /// a migration; callers must opt in deliberately.
    async fn reset(&self, dimension: usize, metric: Distance) -> Result<(), RagError>;

    /// Create the collection if it does not exist yet; a no-op when it does,
    /// even if the existing dimensionality differs.
    async fn ensure(&self, dimension: usize, metric: Distance) -> Result<(), RagError>;

    /// Insert or replace the point with this id.
    async fn upsert(&self, point: VectorPoint) -> Result<(), RagError>;

    /// Upsert a batch of points atomically: either every point lands or
    /// none do.
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<(), RagError>;

    /// Number of points currently stored.
    async fn count(&self) -> Result<usize, RagError>;

    /// The `top_k` nearest points to `query` under the collection's metric,
    /// most similar first, paired with their distance.
    async fn search(&self, query: &[f32], top_k: usize)
    -> Result<Vec<(VectorPoint, f32)>, RagError>;
}
