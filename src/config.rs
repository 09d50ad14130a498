//! Environment-backed configuration.
//!
//! There is no configuration file: every endpoint and connection parameter
//! is a literal constant that can be overridden through the environment
//! (binaries load `.env` via `dotenvy` before building a [`Settings`]).

use std::env;
use std::time::Duration;

/// Default endpoints and connection parameters.
pub mod defaults {
    pub const DOC_STORE_PATH: &str = "ragline.sqlite";
    pub const VECTOR_INDEX_PATH: &str = "ragline_vectors.sqlite";
    pub const VECTOR_COLLECTION: &str = "rag_embeddings";
    pub const GITHUB_RELEASES_URL: &str = "https://api.github.com/repos/ros2/ros2/releases";
    pub const YOUTUBE_SEARCH_URL: &str = "https://yt.lemnoslife.com/search";
    pub const YOUTUBE_QUERY: &str = "ROS2 tutorials";
    pub const YOUTUBE_MAX_RESULTS: usize = 10;
    pub const LINKEDIN_ARTICLES_URL: &str = "https://api.linkedin.com/v2/articles";
    pub const MEDIUM_FEED_URL: &str = "https://medium.com/feed/topic/machine-learning";
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    pub const EMBEDDING_DIMENSION: usize = 384;
    pub const MAX_TOKENS: usize = 512;
}

/// Resolved runtime settings for both batch jobs.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Path ("connection string") of the SQLite document store.
    pub doc_store_path: String,
    /// Path of the SQLite vector index database.
    pub vector_index_path: String,
    /// Name of the vector collection.
    pub vector_collection: String,
    pub github_releases_url: String,
    pub youtube_search_url: String,
    pub youtube_query: String,
    pub youtube_max_results: usize,
    pub linkedin_articles_url: String,
    /// Bearer token for the articles API; absence is an auth error at fetch
    /// time, not at configuration time.
    pub linkedin_access_token: Option<String>,
    pub medium_feed_url: String,
    pub http_timeout: Duration,
    /// Path to the ONNX model file (feature `onnx`).
    pub model_path: String,
    /// Path to the `tokenizer.json` next to the model (feature `onnx`).
    pub tokenizer_path: String,
}

impl Settings {
    /// Builds settings from the process environment, falling back to the
    /// [`defaults`] constants.
    pub fn from_env() -> Self {
        Self {
            doc_store_path: var_or("RAGLINE_DOC_STORE", defaults::DOC_STORE_PATH),
            vector_index_path: var_or("RAGLINE_VECTOR_INDEX", defaults::VECTOR_INDEX_PATH),
            vector_collection: var_or("RAGLINE_VECTOR_COLLECTION", defaults::VECTOR_COLLECTION),
            github_releases_url: var_or("RAGLINE_GITHUB_RELEASES_URL", defaults::GITHUB_RELEASES_URL),
            youtube_search_url: var_or("RAGLINE_YOUTUBE_SEARCH_URL", defaults::YOUTUBE_SEARCH_URL),
            youtube_query: var_or("RAGLINE_YOUTUBE_QUERY", defaults::YOUTUBE_QUERY),
            youtube_max_results: env::var("RAGLINE_YOUTUBE_MAX_RESULTS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults::YOUTUBE_MAX_RESULTS),
            linkedin_articles_url: var_or(
                "RAGLINE_LINKEDIN_ARTICLES_URL",
                defaults::LINKEDIN_ARTICLES_URL,
            ),
            linkedin_access_token: env::var("LINKEDIN_ACCESS_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            medium_feed_url: var_or("RAGLINE_MEDIUM_FEED_URL", defaults::MEDIUM_FEED_URL),
            http_timeout: Duration::from_secs(
                env::var("RAGLINE_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(defaults::HTTP_TIMEOUT_SECS),
            ),
            model_path: var_or("RAGLINE_MODEL_PATH", "models/all-MiniLM-L6-v2/model.onnx"),
            tokenizer_path: var_or(
                "RAGLINE_TOKENIZER_PATH",
                "models/all-MiniLM-L6-v2/tokenizer.json",
            ),
        }
    }

    /// HTTP client shared by all source adapters, with the configured
    /// timeout applied to every request.
    pub fn http_client(&self) -> Result<reqwest::Client, crate::types::RagError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|err| crate::types::RagError::Upstream(err.to_string()))
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_defaults() {
        let settings = Settings::from_env();
        assert!(!settings.doc_store_path.is_empty());
        assert_eq!(settings.vector_collection.is_empty(), false);
        assert!(settings.http_timeout >= Duration::from_secs(1));
    }
}
