//! Authenticated article adapter.
//!
//! The bearer token comes from environment configuration
//! (`LINKEDIN_ACCESS_TOKEN`); a missing token fails with
//! [`RagError::Auth`] before any network call is issued.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::types::{NewRawRecord, RagError, Source};

use super::SourceAdapter;

#[derive(Debug, Deserialize)]
struct ArticleList {
    #[serde(default)]
    elements: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// Fetches the articles endpoint with a bearer token.
#[derive(Clone, Debug)]
pub struct LinkedinArticles {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl LinkedinArticles {
    /// `token` is injected by the caller (typically from
    /// `Settings::linkedin_access_token`) so tests can substitute their own.
    pub fn new(client: Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl SourceAdapter for LinkedinArticles {
    fn source(&self) -> Source {
        Source::Linkedin
    }

    async fn fetch(&self) -> Result<Vec<NewRawRecord>, RagError> {
        let token = self.token.as_deref().ok_or_else(|| {
            RagError::Auth("LINKEDIN_ACCESS_TOKEN is not configured".to_string())
        })?;

        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(RagError::Auth(format!(
                    "articles API rejected the access token ({})",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(RagError::Upstream(format!(
                    "articles API returned {status}"
                )));
            }
            _ => {}
        }

        let list: ArticleList = response.json().await?;
        debug!(count = list.elements.len(), "fetched articles");

        Ok(list
            .elements
            .into_iter()
            .map(|article| {
                let record = NewRawRecord::new(article.url, Source::Linkedin);
                match article.title {
                    Some(title) if !title.is_empty() => record.with_title(title),
                    _ => record,
                }
            })
            .collect())
    }
}
