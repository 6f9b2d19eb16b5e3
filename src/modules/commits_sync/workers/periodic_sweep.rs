// Periodic sweep: re-runs the sync pipeline for every stored watermark on a fixed interval.
//
// Invariants
// - One repository's failure never blocks the others.
// - Each repository is synced under its lock, from a watermark loaded after taking it.
// - No new sweep starts after shutdown; a sweep in progress runs to completion.

use crate::modules::commits_sync::adapters::outbound::commit_source::CommitSource;
use crate::modules::commits_sync::adapters::outbound::watermark_store::{
    StoreError, WatermarkStore,
};
use crate::modules::commits_sync::use_cases::errors::SyncError;
use crate::modules::commits_sync::use_cases::sync_repository::handler::{
    SyncOutcome, SyncPipeline,
};
use crate::modules::commits_sync::workers::repository_locks::RepositoryLocks;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::event_bus::EventBus;
use crate::shared::infrastructure::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub synced: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct PeriodicSweep<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    pipeline: Arc<SyncPipeline<TSource, TBus, TStore>>,
    locks: Arc<RepositoryLocks>,
    interval: Duration,
    call_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl<TSource, TBus, TStore> PeriodicSweep<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized + 'static,
    TBus: EventBus + ?Sized + 'static,
    TStore: WatermarkStore + ?Sized + 'static,
{
    pub fn new(
        pipeline: Arc<SyncPipeline<TSource, TBus, TStore>>,
        locks: Arc<RepositoryLocks>,
        interval: Duration,
        call_timeout: Duration,
        max_concurrent_syncs: usize,
    ) -> Self {
        Self {
            pipeline,
            locks,
            interval,
            call_timeout,
            permits: Arc::new(Semaphore::new(max_concurrent_syncs.max(1))),
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; intents already sync on arrival.
        ticker.tick().await;
        tracing::info!(interval_secs = self.interval.as_secs(), "periodic sweep started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) => tracing::info!(
                            synced = report.synced,
                            published = report.published,
                            failed = report.failed,
                            "sweep finished"
                        ),
                        Err(error) => tracing::error!(error = %error, "sweep could not list watermarks"),
                    }
                }
            }
        }
        tracing::info!("periodic sweep stopped");
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let keys = with_timeout(
            self.call_timeout,
            self.pipeline.store().keys(),
            StoreError::Timeout,
        )
        .await?;

        let mut tasks = JoinSet::new();
        for repository in keys {
            let pipeline = self.pipeline.clone();
            let locks = self.locks.clone();
            let permits = self.permits.clone();
            let call_timeout = self.call_timeout;
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = sync_repository(&pipeline, &locks, &repository, call_timeout).await;
                (repository, result)
            });
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(outcome)))) => {
                    report.synced += 1;
                    if outcome.published {
                        report.published += 1;
                    }
                }
                Ok((_, Ok(None))) => {}
                Ok((repository, Err(error))) => {
                    report.failed += 1;
                    tracing::warn!(%repository, error = %error, "sync failed, retrying next sweep");
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::error!(error = %error, "sync task panicked");
                }
            }
        }
        Ok(report)
    }
}

async fn sync_repository<TSource, TBus, TStore>(
    pipeline: &SyncPipeline<TSource, TBus, TStore>,
    locks: &RepositoryLocks,
    repository: &RepositoryId,
    call_timeout: Duration,
) -> Result<Option<SyncOutcome>, SyncError>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    let _guard = locks.lock(repository).await;
    let current = with_timeout(
        call_timeout,
        pipeline.store().get(repository),
        StoreError::Timeout,
    )
    .await
    .map_err(|source| SyncError::StoreUnavailable {
        repository: repository.clone(),
        source,
    })?;
    match current {
        Some(current) => pipeline.sync_once(current).await.map(Some),
        None => Ok(None),
    }
}
