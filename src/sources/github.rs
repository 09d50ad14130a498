//! Release-list adapter for the code-hosting API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::{NewRawRecord, RagError, Source};

use super::SourceAdapter;

#[derive(Debug, Deserialize)]
struct Release {
    html_url: String,
    #[serde(default)]
    name: Option<String>,
}

/// Fetches the releases endpoint of a repository and maps each release's
/// web URL into a raw record.
#[derive(Clone, Debug)]
pub struct GithubReleases {
    client: Client,
    endpoint: String,
}

impl GithubReleases {
    /// `endpoint` is the full releases URL, e.g.
    /// `https://api.github.com/repos/ros2/ros2/releases`.
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for GithubReleases {
    fn source(&self) -> Source {
        Source::Github
    }

    async fn fetch(&self) -> Result<Vec<NewRawRecord>, RagError> {
        let response = self
            .client
            .get(&self.endpoint)
            // The GitHub API rejects requests without a user agent.
            .header(reqwest::header::USER_AGENT, "ragline")
            .send()
            .await?
            .error_for_status()?;

        let releases: Vec<Release> = response.json().await?;
        debug!(count = releases.len(), "fetched releases");

        Ok(releases
            .into_iter()
            .map(|release| {
                let record = NewRawRecord::new(release.html_url, Source::Github);
                match release.name {
                    Some(name) if !name.is_empty() => record.with_title(name),
                    _ => record,
                }
            })
            .collect())
    }
}
