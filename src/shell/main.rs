use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use commit_watch::modules::commit_history::adapters::outbound::commit_store_in_memory::InMemoryCommitStore;
use commit_watch::modules::commits_sync::adapters::outbound::commit_source_github::GithubCommitSource;
use commit_watch::modules::commits_sync::adapters::outbound::intent_registry_in_memory::InMemoryIntentRegistry;
use commit_watch::modules::commits_sync::adapters::outbound::watermark_store::WatermarkStore;
use commit_watch::modules::commits_sync::adapters::outbound::watermark_store_in_memory::InMemoryWatermarkStore;
use commit_watch::modules::commits_sync::adapters::outbound::watermark_store_json_file::JsonFileWatermarkStore;
use commit_watch::shared::infrastructure::event_bus::in_memory::InMemoryEventBus;
use commit_watch::shell::config::AppConfig;
use commit_watch::shell::http::router;
use commit_watch::shell::state::AppState;
use commit_watch::shell::workers::{Adapters, WorkerSettings, spawn_workers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::from_env()?;

    let watermarks: Arc<dyn WatermarkStore> = match &config.watermark_store_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using JSON file watermark store");
            Arc::new(JsonFileWatermarkStore::open(path).await?)
        }
        None => {
            tracing::warn!("EXPLORER_WATERMARK_STORE_PATH unset, watermarks will not survive a restart");
            Arc::new(InMemoryWatermarkStore::new())
        }
    };
    let bus = Arc::new(InMemoryEventBus::new(config.ack_timeout));
    let commits = Arc::new(InMemoryCommitStore::new());
    let source = Arc::new(GithubCommitSource::new(config.github())?);

    let shutdown = CancellationToken::new();
    let mut workers = spawn_workers(
        Adapters {
            source,
            bus: bus.clone(),
            watermarks,
            commits: commits.clone(),
        },
        WorkerSettings {
            retry: config.retry,
            redelivery: config.redelivery,
            call_timeout: config.upstream_timeout,
            drain_timeout: config.sync_timeout,
            max_concurrent_syncs: config.max_concurrent_syncs,
            monitoring_interval: config.monitoring_interval,
        },
        shutdown.clone(),
    )
    .await?;

    let app = router(AppState::new(
        bus.clone(),
        Arc::new(InMemoryIntentRegistry::new()),
        commits,
        config.upstream_timeout,
    ));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    tracing::info!("listening on http://{addr}, GraphQL endpoint: http://{addr}/gql");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %error, "could not listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    while let Some(joined) = workers.join_next().await {
        if let Err(error) = joined {
            tracing::error!(error = %error, "worker panicked");
        }
    }
    bus.close();
    tracing::info!("stopped");
    Ok(())
}
