// Background workers: the intent consumer, the storage consumers and the periodic sweep.

use crate::modules::commit_history::adapters::outbound::commit_store::CommitHistoryRepository;
use crate::modules::commit_history::use_cases::store_sync_events::handler::{
    STORAGE_CONSUMER_GROUP, StoreSyncEventsHandler,
};
use crate::modules::commits_sync::adapters::outbound::commit_source::CommitSource;
use crate::modules::commits_sync::adapters::outbound::watermark_store::WatermarkStore;
use crate::modules::commits_sync::core::events::{
    COMMITS_BATCH_PUBLISHED, INTENT_SUBMITTED, REPOSITORY_INFO_PUBLISHED,
};
use crate::modules::commits_sync::use_cases::sync_repository::handler::SyncPipeline;
use crate::modules::commits_sync::workers::intent_processor::{
    INTENT_CONSUMER_GROUP, IntentProcessor,
};
use crate::modules::commits_sync::workers::periodic_sweep::PeriodicSweep;
use crate::modules::commits_sync::workers::repository_locks::RepositoryLocks;
use crate::shared::infrastructure::event_bus::consumer::run_consumer;
use crate::shared::infrastructure::event_bus::{BusError, EventBus};
use crate::shared::infrastructure::retry::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Adapters {
    pub source: Arc<dyn CommitSource>,
    pub bus: Arc<dyn EventBus>,
    pub watermarks: Arc<dyn WatermarkStore>,
    pub commits: Arc<dyn CommitHistoryRepository>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerSettings {
    pub retry: RetryConfig,
    pub redelivery: RetryConfig,
    pub call_timeout: Duration,
    pub drain_timeout: Duration,
    pub max_concurrent_syncs: usize,
    pub monitoring_interval: Duration,
}

/// Subscribes every consumer and starts the sweep. All tasks stop once `shutdown` fires.
pub async fn spawn_workers(
    adapters: Adapters,
    settings: WorkerSettings,
    shutdown: CancellationToken,
) -> Result<JoinSet<()>, BusError> {
    let pipeline = Arc::new(SyncPipeline::new(
        adapters.source,
        adapters.bus.clone(),
        adapters.watermarks,
        settings.retry,
        settings.call_timeout,
        settings.drain_timeout,
    ));
    let locks = Arc::new(RepositoryLocks::new());

    let intents = adapters
        .bus
        .subscribe(INTENT_SUBMITTED, INTENT_CONSUMER_GROUP)
        .await?;
    let repository_infos = adapters
        .bus
        .subscribe(REPOSITORY_INFO_PUBLISHED, STORAGE_CONSUMER_GROUP)
        .await?;
    let batches = adapters
        .bus
        .subscribe(COMMITS_BATCH_PUBLISHED, STORAGE_CONSUMER_GROUP)
        .await?;

    let processor = Arc::new(IntentProcessor::new(
        pipeline.clone(),
        locks.clone(),
        settings.call_timeout,
    ));
    let storage = Arc::new(StoreSyncEventsHandler::new(
        adapters.commits,
        settings.call_timeout,
    ));
    let sweep = PeriodicSweep::new(
        pipeline,
        locks,
        settings.monitoring_interval,
        settings.call_timeout,
        settings.max_concurrent_syncs,
    );

    let mut tasks = JoinSet::new();
    tasks.spawn(run_consumer(
        "intent-processor",
        intents,
        processor,
        settings.max_concurrent_syncs,
        settings.redelivery,
        shutdown.clone(),
    ));
    tasks.spawn(run_consumer(
        "repository-info-storage",
        repository_infos,
        storage.clone(),
        settings.max_concurrent_syncs,
        settings.redelivery,
        shutdown.clone(),
    ));
    tasks.spawn(run_consumer(
        "commits-batch-storage",
        batches,
        storage,
        settings.max_concurrent_syncs,
        settings.redelivery,
        shutdown.clone(),
    ));
    tasks.spawn(async move { sweep.run(shutdown).await });

    Ok(tasks)
}
