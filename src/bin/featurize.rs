//! Featurization batch job: embed unprocessed raw records, upsert one
//! vector point per record, and write the processed-record mirror.
//!
//! With the `onnx` feature the real transformer model is loaded (fatal if
//! the model or tokenizer is missing); without it the deterministic mock
//! provider is used so the job stays runnable in model-less environments.
//!
//! Pass `--reset-index` to destructively recreate the vector collection
//! before embedding. All previously indexed points are lost.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use ragline::config::Settings;
use ragline::embedding::EmbeddingProvider;
use ragline::index::SqliteVectorIndex;
use ragline::pipeline::{FeaturizationJob, FeaturizeOptions};
use ragline::store::SqliteDocumentStore;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let reset_index = std::env::args().any(|arg| arg == "--reset-index");

    match run(reset_index).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "featurization job failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(reset_index: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();

    let store = Arc::new(SqliteDocumentStore::open(&settings.doc_store_path).await?);
    let index = Arc::new(
        SqliteVectorIndex::open(&settings.vector_index_path, &settings.vector_collection).await?,
    );
    let embedder = build_embedder(&settings)?;

    let options = FeaturizeOptions {
        reset_index,
        ..Default::default()
    };
    let report = FeaturizationJob::new(store, index, embedder, options)
        .run()
        .await?;

    if report.is_noop() {
        tracing::info!("nothing to featurize");
    } else {
        tracing::info!(processed = report.processed, "featurization succeeded");
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_embedder(
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>, Box<dyn std::error::Error>> {
    use ragline::config::defaults::{EMBEDDING_DIMENSION, MAX_TOKENS};
    use ragline::embedding::OnnxEmbedder;

    let embedder = OnnxEmbedder::load(
        &settings.model_path,
        &settings.tokenizer_path,
        EMBEDDING_DIMENSION,
        MAX_TOKENS,
    )?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn build_embedder(
    _settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>, Box<dyn std::error::Error>> {
    use ragline::embedding::MockEmbeddingProvider;

    tracing::warn!("built without the 'onnx' feature; using the mock embedding provider");
    Ok(Arc::new(MockEmbeddingProvider::new()))
}
