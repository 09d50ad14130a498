//! RSS/Atom feed adapter with lenient per-entry parsing.

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, warn};

use crate::types::{NewRawRecord, RagError, Source};

use super::SourceAdapter;

/// Parses an RSS/Atom feed and maps each entry's link and title.
///
/// Entries missing a usable link are skipped individually rather than
/// aborting the whole fetch; a feed that cannot be parsed at all is an
/// upstream error.
#[derive(Clone, Debug)]
pub struct MediumFeed {
    client: Client,
    feed_url: String,
}

impl MediumFeed {
    pub fn new(client: Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for MediumFeed {
    fn source(&self) -> Source {
        Source::Medium
    }

    async fn fetch(&self) -> Result<Vec<NewRawRecord>, RagError> {
        let body = self
            .client
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let feed = parser::parse(body.as_ref())
            .map_err(|err| RagError::Upstream(format!("unparseable feed: {err}")))?;

        let total = feed.entries.len();
        let mut records = Vec::with_capacity(total);
        for entry in feed.entries {
            let Some(link) = entry.links.first() else {
                warn!(entry_id = %entry.id, "skipping feed entry without a link");
                continue;
            };
            let record = NewRawRecord::new(link.href.clone(), Source::Medium);
            records.push(match entry.title {
                Some(title) if !title.content.is_empty() => record.with_title(title.content),
                _ => record,
            });
        }

        debug!(kept = records.len(), total, "parsed feed entries");
        Ok(records)
    }
}
