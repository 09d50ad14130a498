//! In-memory vector index used as a test double.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::types::{RagError, VectorPoint};

use super::{Distance, VectorIndex};

#[derive(Debug, Default)]
struct Collection {
    dimension: Option<usize>,
    metric: Distance,
    points: BTreeMap<i64, VectorPoint>,
}

/// BTreeMap-backed index mirroring the SQLite backend's contract,
/// including dimension checks on upsert.
#[derive(Clone, Debug, Default)]
pub struct MemoryVectorIndex {
    inner: Arc<Mutex<Collection>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_dimension(collection: &Collection, point: &VectorPoint) -> Result<(), RagError> {
        match collection.dimension {
            None => Err(RagError::Store(
                "collection has not been created; call reset first".to_string(),
            )),
            Some(dimension) if point.vector.len() != dimension => Err(RagError::Store(format!(
                "vector for point {} has length {}, collection expects {dimension}",
                point.id,
                point.vector.len()
            ))),
            Some(_) => Ok(()),
        }
    }
}

fn distance(metric: Distance, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Distance::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        Distance::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn reset(&self, dimension: usize, metric: Distance) -> Result<(), RagError> {
        let mut guard = self.inner.lock().await;
        guard.dimension = Some(dimension);
        guard.metric = metric;
        guard.points.clear();
        Ok(())
    }

    async fn ensure(&self, dimension: usize, metric: Distance) -> Result<(), RagError> {
        let mut guard = self.inner.lock().await;
        if guard.dimension.is_none() {
            guard.dimension = Some(dimension);
            guard.metric = metric;
        }
        Ok(())
    }

    async fn upsert(&self, point: VectorPoint) -> Result<(), RagError> {
        let mut guard = self.inner.lock().await;
        Self::check_dimension(&guard, &point)?;
        guard.points.insert(point.id, point);
        Ok(())
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<(), RagError> {
        let mut guard = self.inner.lock().await;
        for point in &points {
            Self::check_dimension(&guard, point)?;
        }
        for point in points {
            guard.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.inner.lock().await.points.len())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(VectorPoint, f32)>, RagError> {
        let guard = self.inner.lock().await;
        let metric = guard.metric;
        let mut scored: Vec<(VectorPoint, f32)> = guard
            .points
            .values()
            .map(|point| (point.clone(), distance(metric, query, &point.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);
        Ok(scored)
    }
}
