//! Embedding providers: turn text into fixed-length dense vectors.
//!
//! The pipeline depends only on the [`EmbeddingProvider`] trait. The real
//! transformer backend lives in [`onnx`] behind the `onnx` feature; the
//! [`MockEmbeddingProvider`] is always available for tests and dry runs.

#[cfg(feature = "onnx")]
pub mod onnx;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::config::defaults::EMBEDDING_DIMENSION;
use crate::types::RagError;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

/// A model that maps text to a fixed-length dense vector.
///
/// Implementations must be deterministic: the same input under the same
/// model version yields the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. The returned vector always has [`dimension`] entries.
    ///
    /// [`dimension`]: EmbeddingProvider::dimension
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Length of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Short identifier used in reports and logs.
    fn name(&self) -> &'static str;
}

/// Deterministic hash-based provider for tests and model-less environments.
///
/// Vectors are derived from the input text alone, so identical texts map to
/// identical vectors and different texts (almost surely) differ.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSION,
        }
    }

    /// Provider with a non-default dimensionality.
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vector = Vec::with_capacity(self.dimension);
        for component in 0..self.dimension {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            component.hash(&mut hasher);
            let bits = hasher.finish();
            // Map the hash onto [-1, 1].
            vector.push((bits as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_have_fixed_length() {
        let provider = MockEmbeddingProvider::new();
        for text in ["a", "some longer text", "http://example.com"] {
            let vector = provider.embed(text).await.unwrap();
            assert_eq!(vector.len(), EMBEDDING_DIMENSION);
        }
    }

    #[tokio::test]
    async fn with_dimension_controls_vector_length() {
        let provider = MockEmbeddingProvider::with_dimension(8);
        assert_eq!(provider.dimension(), 8);

        let vector = provider.embed("short vectors").await.unwrap();
        assert_eq!(vector.len(), 8);
    }

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let first = provider.embed("hello world").await.unwrap();
        let second = provider.embed("hello world").await.unwrap();
        let other = provider.embed("goodbye world").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
