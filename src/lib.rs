//! ```text
//! Source Adapters ──► pipeline::etl (extract x4) ──► store::DocumentStore
//!                                      │
//!                                      ├─► transform (full-table rewrite)
//!                                      └─► load (report sink)
//!
//! Unprocessed raw records ──► pipeline::featurize ──► embedding provider
//!                                      │
//!                                      ├─► index::VectorIndex (one point per record)
//!                                      └─► processed-record mirror
//!
//! Indexed vectors ──► VectorIndex::search ──► RAG applications
//! ```

pub mod config;
pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod types;

pub use config::Settings;
pub use pipeline::{FeaturizationJob, FeaturizeOptions, Pipeline, PipelineError};
pub use types::{RagError, Source};
