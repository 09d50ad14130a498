//! Transformer embeddings via ONNX Runtime.
//!
//! Loads a sentence-transformer checkpoint (e.g. all-MiniLM-L6-v2 exported
//! to ONNX) together with its `tokenizer.json`. Inputs are tokenized with
//! truncation and padding to a fixed maximum length, the session runs in
//! inference mode, and per-token hidden states are mean-pooled across the
//! token axis into one vector.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::info;

use crate::types::RagError;

use super::EmbeddingProvider;

fn model_err(err: impl std::fmt::Display) -> RagError {
    RagError::Model(err.to_string())
}

/// ONNX-backed embedding provider.
///
/// Construction is fatal on failure: if the model or tokenizer cannot be
/// loaded the whole run aborts, rather than failing per record.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Loads the tokenizer and model session.
    ///
    /// `dimension` is the expected hidden size (384 for MiniLM);
    /// `max_tokens` bounds tokenization (512 for BERT-family models).
    pub fn load(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        dimension: usize,
        max_tokens: usize,
    ) -> Result<Self, RagError> {
        let model_path = model_path.as_ref();

        let mut tokenizer = Tokenizer::from_file(tokenizer_path.as_ref()).map_err(model_err)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(model_err)?;
        if tokenizer.get_padding().is_none() {
            tokenizer.with_padding(Some(PaddingParams::default()));
        }

        ort::init().with_name("ragline").commit().map_err(model_err)?;
        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .commit_from_file(model_path)
            .map_err(model_err)?;

        info!(model = %model_path.display(), dimension, "loaded embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimension,
        })
    }

    fn run_inference(
        session: &Arc<Mutex<Session>>,
        tokenizer: &Tokenizer,
        dimension: usize,
        text: &str,
    ) -> Result<Vec<f32>, RagError> {
        let encoding = tokenizer.encode(text, true).map_err(model_err)?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();
        let seq_len = ids.len();
        if seq_len == 0 {
            return Err(RagError::Model("tokenizer produced no tokens".to_string()));
        }

        let input_ids = Tensor::from_array(([1, seq_len], ids)).map_err(model_err)?;
        let attention_mask = Tensor::from_array(([1, seq_len], mask.clone())).map_err(model_err)?;
        let token_type_ids = Tensor::from_array(([1, seq_len], type_ids)).map_err(model_err)?;

        let mut session = session
            .lock()
            .map_err(|_| RagError::Model("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
            .map_err(model_err)?;

        // Locate the hidden-state output [1, seq_len, hidden] and mean-pool
        // it across the token axis, weighting by the attention mask.
        for (_name, output) in outputs.iter() {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                if shape.len() == 3 && shape[0] == 1 && shape[1] == seq_len as i64 {
                    let hidden = shape[2] as usize;
                    let pooled = mean_pool(data, &mask, seq_len, hidden);
                    if pooled.len() != dimension {
                        return Err(RagError::Model(format!(
                            "model produced {} dimensions, expected {dimension}",
                            pooled.len()
                        )));
                    }
                    return Ok(pooled);
                }
            }
        }

        Err(RagError::Model(
            "model outputs contained no hidden-state tensor".to_string(),
        ))
    }
}

fn mean_pool(data: &[f32], mask: &[i64], seq_len: usize, hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut kept = 0.0f32;
    for token in 0..seq_len {
        if mask.get(token).copied().unwrap_or(0) == 0 {
            continue;
        }
        let offset = token * hidden;
        for (component, value) in pooled.iter_mut().zip(&data[offset..offset + hidden]) {
            *component += *value;
        }
        kept += 1.0;
    }
    if kept > 0.0 {
        for value in &mut pooled {
            *value /= kept;
        }
    }
    pooled
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dimension = self.dimension;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            Self::run_inference(&session, &tokenizer, dimension, &text)
        })
        .await
        .map_err(|err| RagError::Model(format!("inference task failed: {err}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_averages_only_attended_tokens() {
        // Two tokens attended, one padded.
        let data = [1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let mask = [1, 1, 0];
        let pooled = mean_pool(&data, &mask, 3, 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn load_fails_without_model_files() {
        let result = OnnxEmbedder::load("missing/model.onnx", "missing/tokenizer.json", 384, 512);
        assert!(matches!(result, Err(RagError::Model(_))));
    }
}
