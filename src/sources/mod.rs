//! Source adapters: one per upstream system the ETL job extracts from.
//!
//! Each adapter is stateless, has no side effects beyond its outbound
//! network call, and maps upstream items into the common [`NewRawRecord`]
//! shape. The four adapters are independent and order-insensitive; the
//! pipeline wires each one as its own extract step.

pub mod github;
pub mod linkedin;
pub mod medium;
pub mod youtube;

use async_trait::async_trait;

use crate::types::{NewRawRecord, RagError, Source};

pub use github::GithubReleases;
pub use linkedin::LinkedinArticles;
pub use medium::MediumFeed;
pub use youtube::YoutubeSearch;

/// Contract shared by all extract adapters.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which upstream this adapter speaks to.
    fn source(&self) -> Source;

    /// Fetch the current set of items from the upstream.
    ///
    /// An empty upstream yields an empty vector, not an error. Transport
    /// and non-success responses surface as [`RagError::Upstream`];
    /// credential problems as [`RagError::Auth`].
    async fn fetch(&self) -> Result<Vec<NewRawRecord>, RagError>;
}
