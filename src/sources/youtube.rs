//! Video-search adapter: bounded top-N queries against a search backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::{NewRawRecord, RagError, Source};

use super::SourceAdapter;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "videoId")]
    video_id: String,
    #[serde(default)]
    title: Option<String>,
}

/// Issues a bounded search query and maps each hit to its watch-page URL.
///
/// An empty result set is a valid outcome and yields an empty vector.
#[derive(Clone, Debug)]
pub struct YoutubeSearch {
    client: Client,
    endpoint: String,
    query: String,
    max_results: usize,
}

impl YoutubeSearch {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        query: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            query: query.into(),
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl SourceAdapter for YoutubeSearch {
    fn source(&self) -> Source {
        Source::Youtube
    }

    async fn fetch(&self) -> Result<Vec<NewRawRecord>, RagError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", self.query.as_str()),
                ("type", "video"),
                ("limit", &self.max_results.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let hits: Vec<SearchHit> = response.json().await?;
        debug!(count = hits.len(), query = %self.query, "video search returned");

        Ok(hits
            .into_iter()
            .take(self.max_results)
            .map(|hit| {
                let record = NewRawRecord::new(
                    format!("{WATCH_URL_PREFIX}{}", hit.video_id),
                    Source::Youtube,
                );
                match hit.title {
                    Some(title) if !title.is_empty() => record.with_title(title),
                    _ => record,
                }
            })
            .collect())
    }
}
