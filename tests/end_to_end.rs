//! End-to-end tests: a full ETL run against mocked source endpoints
//! followed by a featurization run, both on the SQLite backends.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

use ragline::embedding::MockEmbeddingProvider;
use ragline::index::{SqliteVectorIndex, VectorIndex};
use ragline::pipeline::{FeaturizationJob, FeaturizeOptions, PipelineError, etl_pipeline};
use ragline::sources::{
    GithubReleases, LinkedinArticles, MediumFeed, SourceAdapter, YoutubeSearch,
};
use ragline::store::{DocumentStore, SqliteDocumentStore};
use ragline::types::{NewRawRecord, RagError, Source};

const MEDIUM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>ML Feed</title>
    <link>https://medium.com</link>
    <description>posts</description>
    <item>
      <title>Embeddings Explained</title>
      <link>https://medium.com/p/embeddings-explained</link>
      <guid>emb-1</guid>
    </item>
  </channel>
</rss>"#;

async fn mock_all_sources(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/releases");
            then.status(200).json_body(json!([
                {"html_url": "https://github.com/ros2/ros2/releases/tag/r1", "name": "Release 1"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([
                {"videoId": "vid1", "title": "Tutorial"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/articles");
            then.status(200).json_body(json!({
                "elements": [{"url": "https://www.linkedin.com/pulse/post-1", "title": "Post"}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/feed");
            then.status(200).body(MEDIUM_FEED);
        })
        .await;
}

fn adapters(server: &MockServer, linkedin_token: Option<String>) -> Vec<Arc<dyn SourceAdapter>> {
    let client = reqwest::Client::new();
    vec![
        Arc::new(GithubReleases::new(client.clone(), server.url("/releases"))),
        Arc::new(YoutubeSearch::new(
            client.clone(),
            server.url("/search"),
            "ROS2 tutorials",
            10,
        )),
        Arc::new(LinkedinArticles::new(
            client.clone(),
            server.url("/articles"),
            linkedin_token,
        )),
        Arc::new(MediumFeed::new(client, server.url("/feed"))),
    ]
}

#[tokio::test]
async fn etl_over_sqlite_flags_every_record() {
    let server = MockServer::start_async().await;
    mock_all_sources(&server).await;
    let dir = tempdir().unwrap();

    let store = Arc::new(
        SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap(),
    );

    let report = etl_pipeline(adapters(&server, Some("token".to_string())), store.clone())
        .run()
        .await
        .unwrap();

    // Four extracts, transform, load.
    assert_eq!(report.steps.len(), 6);
    let names: Vec<&str> = report.steps.iter().map(|step| step.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "extract_github",
            "extract_youtube",
            "extract_linkedin",
            "extract_medium",
            "transform",
            "load"
        ]
    );
    assert_eq!(store.count_raw().await.unwrap(), 4);

    let raw = store.list_raw().await.unwrap();
    assert!(raw.iter().all(|record| record.processed));
    for source in [Source::Github, Source::Youtube, Source::Linkedin, Source::Medium] {
        assert_eq!(raw.iter().filter(|r| r.source == source).count(), 1);
    }

    // The transform stage already flagged everything, so a featurization
    // run over this store finds nothing unprocessed.
    let index = Arc::new(
        SqliteVectorIndex::open(dir.path().join("vectors.sqlite"), "rag_embeddings")
            .await
            .unwrap(),
    );
    let job = FeaturizationJob::new(
        store.clone(),
        index.clone(),
        Arc::new(MockEmbeddingProvider::new()),
        FeaturizeOptions::default(),
    );
    let outcome = job.run().await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(index.count().await.unwrap(), 0);
    assert_eq!(store.count_processed().await.unwrap(), 0);
}

#[tokio::test]
async fn featurize_unprocessed_records_over_sqlite() {
    let dir = tempdir().unwrap();

    let store = Arc::new(
        SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap(),
    );
    store
        .insert_raw(vec![
            NewRawRecord::new("https://github.com/ros2/ros2/releases/tag/r1", Source::Github),
            NewRawRecord::new("https://www.youtube.com/watch?v=vid1", Source::Youtube),
            NewRawRecord::new("https://www.linkedin.com/pulse/post-1", Source::Linkedin),
            NewRawRecord::new("https://medium.com/p/embeddings-explained", Source::Medium)
                .with_text("a post about embeddings"),
        ])
        .await
        .unwrap();

    let index = Arc::new(
        SqliteVectorIndex::open(dir.path().join("vectors.sqlite"), "rag_embeddings")
            .await
            .unwrap(),
    );
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let job = FeaturizationJob::new(
        store.clone(),
        index.clone(),
        embedder.clone(),
        FeaturizeOptions::default(),
    );

    let outcome = job.run().await.unwrap();
    assert_eq!(outcome.processed, 4);
    assert_eq!(index.count().await.unwrap(), 4);
    assert_eq!(store.count_processed().await.unwrap(), 4);

    let raw = store.list_raw().await.unwrap();
    assert!(raw.iter().all(|record| record.processed));
    for record in &raw {
        let mirror = store.get_processed(record.id).await.unwrap().unwrap();
        assert_eq!(mirror.embedding_id, record.id.to_string());
        assert_eq!(mirror.source, record.source);
        assert!(!mirror.text.is_empty());
    }
    assert_eq!(store.list_processed().await.unwrap().len(), 4);

    // The indexed vectors are searchable; the nearest neighbor of a
    // record's own embedding is that record.
    use ragline::embedding::EmbeddingProvider;
    let query = embedder.embed(raw[0].embedding_text()).await.unwrap();
    let results = index.search(&query, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0.id, raw[0].id);

    // A second featurization run finds nothing left to process.
    let again = job.run().await.unwrap();
    assert!(again.is_noop());
    assert_eq!(store.count_processed().await.unwrap(), 4);
    assert_eq!(index.count().await.unwrap(), 4);
}

#[tokio::test]
async fn failed_extract_halts_but_keeps_earlier_writes() {
    let server = MockServer::start_async().await;
    mock_all_sources(&server).await;
    let dir = tempdir().unwrap();

    let store = Arc::new(
        SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap(),
    );

    // No token: the linkedin extract fails and the pipeline halts there.
    let err = etl_pipeline(adapters(&server, None), store.clone())
        .run()
        .await
        .unwrap_err();
    let PipelineError::Step { step, source } = err;
    assert_eq!(step, "extract_linkedin");
    assert!(matches!(source, RagError::Auth(_)));

    // Records from the extracts that ran before the failure are kept, and
    // nothing was transformed.
    let raw = store.list_raw().await.unwrap();
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().all(|record| !record.processed));
}
