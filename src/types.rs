//! Core record shapes and the crate-wide error taxonomy.
//!
//! Every stage of the pipeline speaks in terms of these types: source
//! adapters emit [`NewRawRecord`]s, the document store assigns identity and
//! hands back [`RawRecord`]s, and the featurization driver derives a
//! [`ProcessedRecord`] plus a [`VectorPoint`] per raw record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upstream origin of a raw record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Github,
    Youtube,
    Linkedin,
    Medium,
}

impl Source {
    /// Stable lowercase name used in payloads and SQL columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Github => "github",
            Source::Youtube => "youtube",
            Source::Linkedin => "linkedin",
            Source::Medium => "medium",
        }
    }

    /// All known sources, in the order the ETL pipeline extracts them.
    pub const ALL: [Source; 4] = [
        Source::Github,
        Source::Youtube,
        Source::Linkedin,
        Source::Medium,
    ];
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Source::Github),
            "youtube" => Ok(Source::Youtube),
            "linkedin" => Ok(Source::Linkedin),
            "medium" => Ok(Source::Medium),
            other => Err(RagError::Store(format!("unknown source '{other}'"))),
        }
    }
}

/// A record discovered by a source adapter, before the store assigns identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRawRecord {
    pub url: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NewRawRecord {
    /// Minimal record with just a URL and its source.
    pub fn new(url: impl Into<String>, source: Source) -> Self {
        Self {
            url: url.into(),
            source,
            title: None,
            text: None,
        }
    }

    /// Attach a title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach body text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A raw record as stored in the document store.
///
/// `processed` transitions `false -> true` at most once; there is no
/// un-processing. Identity is assigned by the raw store on insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub url: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub processed: bool,
    pub inserted_at: DateTime<Utc>,
}

impl RawRecord {
    /// Text submitted to the embedding model: body text when present, the
    /// URL otherwise, and a literal placeholder as the last resort.
    pub fn embedding_text(&self) -> &str {
        match (&self.text, self.url.is_empty()) {
            (Some(text), _) if !text.is_empty() => text,
            (_, false) => &self.url,
            _ => "Unknown",
        }
    }
}

/// Immutable mirror written once a raw record has been embedded and indexed.
///
/// 1:1 with the raw record it derives from (joined by `id`); `embedding_id`
/// must resolve to exactly one vector point with the same id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: i64,
    pub text: String,
    pub embedding_id: String,
    pub source: Source,
    pub processed: bool,
}

/// One entry in the vector collection; lifetime is tied to the collection
/// and ends when it is reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: i64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Minimal payload stored alongside each vector point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub source: Source,
}

/// Crate-wide error taxonomy.
///
/// No stage performs local recovery: every error aborts the current
/// step/run and is surfaced to the invoking process with its cause.
#[derive(Debug, Error)]
pub enum RagError {
    /// Source unreachable or non-success response.
    #[error("upstream source error: {0}")]
    Upstream(String),

    /// Missing or rejected credential.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Embedding model or tokenizer unavailable.
    #[error("embedding model error: {0}")]
    Model(String),

    /// Document store or vector index unreachable or failing.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem error while reading local inputs.
    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Upstream(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for RagError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        RagError::Store(err.to_string())
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_str() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
        assert!("gitlab".parse::<Source>().is_err());
    }

    #[test]
    fn embedding_text_prefers_body_then_url() {
        let mut record = RawRecord {
            id: 1,
            url: "http://x".into(),
            source: Source::Github,
            title: None,
            text: Some("body".into()),
            processed: false,
            inserted_at: Utc::now(),
        };
        assert_eq!(record.embedding_text(), "body");

        record.text = None;
        assert_eq!(record.embedding_text(), "http://x");

        record.url.clear();
        assert_eq!(record.embedding_text(), "Unknown");
    }
}
