use anyhow::Context;
use background_service::{LifecycleController, PollSettings};
use database::KeyValueCache;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tweetwatch_core::AppConfig;
use twitter_client::SearchApiClient;

const DEFAULT_LOG_FILTER: &str =
    "tweetwatch=debug,background_service=debug,twitter_client=info,database=info,notifier=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Tweetwatch - recent tweet search notifier");

    let config = AppConfig::load_from_env().context("failed to load configuration")?;
    let cache = Arc::new(KeyValueCache::from_config(&config.cache).context("failed to locate cache")?);
    let client = Arc::new(SearchApiClient::new(&config.api).context("failed to build search client")?);

    let controller =
        LifecycleController::bootstrap(client, cache, PollSettings::from(&config.search)).await;
    if let Some(terms) = controller.status().await.cached_search_terms {
        tracing::info!("Previous search terms: {}", terms.join(", "));
    }

    controller
        .start(config.search.filter(), Some(config.notifier))
        .await
        .context("failed to start polling")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    controller.stop().await.context("failed to stop polling")?;
    Ok(())
}
