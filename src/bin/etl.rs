//! ETL batch job: extract from all four sources, transform, load.
//!
//! Exits 0 on full success; a failed step logs its name and cause and
//! exits non-zero. Data committed by earlier steps stays in the store.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use ragline::config::Settings;
use ragline::pipeline::etl_pipeline;
use ragline::sources::{
    GithubReleases, LinkedinArticles, MediumFeed, SourceAdapter, YoutubeSearch,
};
use ragline::store::SqliteDocumentStore;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "etl job failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    let client = settings.http_client()?;

    let store = Arc::new(SqliteDocumentStore::open(&settings.doc_store_path).await?);
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(GithubReleases::new(
            client.clone(),
            settings.github_releases_url.clone(),
        )),
        Arc::new(YoutubeSearch::new(
            client.clone(),
            settings.youtube_search_url.clone(),
            settings.youtube_query.clone(),
            settings.youtube_max_results,
        )),
        Arc::new(LinkedinArticles::new(
            client.clone(),
            settings.linkedin_articles_url.clone(),
            settings.linkedin_access_token.clone(),
        )),
        Arc::new(MediumFeed::new(client, settings.medium_feed_url.clone())),
    ];

    let report = etl_pipeline(adapters, store).run().await?;
    tracing::info!(
        run_id = %report.run_id,
        total = report.total_records(),
        "etl pipeline succeeded"
    );
    Ok(())
}
