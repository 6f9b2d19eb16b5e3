// Sync pipeline: one fetch-and-publish cycle for one repository.
//
// Purpose
// - Turn a watermark into an upstream fetch, a published commits batch and an advanced watermark.
//
// Time bounds
// - Single calls (fetch_repo, publish, persist) get `call_timeout`.
// - fetch_commits follows every page of the window, so it gets `drain_timeout` as a whole; the
//   source bounds each page request on its own.
//
// Ordering
// - fetch, then publish, then persist. A failed fetch or publish leaves the watermark untouched,
//   so the next cycle retries the same window. A crash between publish and persist republishes
//   the batch, which consumers absorb through (repository, hash) uniqueness.

use crate::modules::commits_sync::adapters::outbound::commit_source::{
    CommitSource, UpstreamError,
};
use crate::modules::commits_sync::adapters::outbound::watermark_store::{
    StoreError, Versioned, WatermarkStore,
};
use crate::modules::commits_sync::core::commit::RepositoryInfo;
use crate::modules::commits_sync::core::events::{
    CommitsBatchPublishedV1, RepositoryInfoPublishedV1, SyncEvent,
};
use crate::modules::commits_sync::core::fetch_window::{CycleDecision, FetchWindow, plan_cycle};
use crate::modules::commits_sync::core::watermark::Watermark;
use crate::modules::commits_sync::use_cases::errors::SyncError;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::event_bus::{BusError, EventBus};
use crate::shared::infrastructure::retry::{RetryConfig, retry_with_backoff, with_timeout};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub published: bool,
    pub watermark: Versioned<Watermark>,
}

pub struct SyncPipeline<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    source: Arc<TSource>,
    bus: Arc<TBus>,
    store: Arc<TStore>,
    retry: RetryConfig,
    call_timeout: Duration,
    drain_timeout: Duration,
}

impl<TSource, TBus, TStore> SyncPipeline<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    pub fn new(
        source: Arc<TSource>,
        bus: Arc<TBus>,
        store: Arc<TStore>,
        retry: RetryConfig,
        call_timeout: Duration,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            source,
            bus,
            store,
            retry,
            call_timeout,
            drain_timeout: drain_timeout.max(call_timeout),
        }
    }

    pub fn store(&self) -> &Arc<TStore> {
        &self.store
    }

    pub async fn sync_once(&self, current: Versioned<Watermark>) -> Result<SyncOutcome, SyncError> {
        let watermark = &current.value;
        let repository = &watermark.repository;
        let window = FetchWindow::for_watermark(watermark);
        tracing::debug!(%repository, since = %window.since, until = ?window.until, "sync cycle started");

        let fetched = retry_with_backoff(self.retry, "fetch_commits", || {
            with_timeout(
                self.drain_timeout,
                self.source.fetch_commits(repository, window),
                UpstreamError::Timeout,
            )
        })
        .await
        .map_err(|source| SyncError::UpstreamUnavailable {
            repository: repository.clone(),
            source,
        })?;
        let fetched_count = fetched.len();

        match plan_cycle(watermark, fetched) {
            CycleDecision::Idle => {
                tracing::debug!(%repository, since = %window.since, "no new commits");
                Ok(SyncOutcome {
                    published: false,
                    watermark: current,
                })
            }
            CycleDecision::Drained { watermark: next } => {
                let version = self.persist(&next, current.version).await?;
                tracing::info!(
                    %repository,
                    since = %window.since,
                    until = ?window.until,
                    fetched = fetched_count,
                    "backfill window drained, tracking forward"
                );
                Ok(SyncOutcome {
                    published: false,
                    watermark: Versioned {
                        value: next,
                        version,
                    },
                })
            }
            CycleDecision::Publish {
                commits,
                watermark: next,
            } => {
                let published = commits.len();
                let event = SyncEvent::CommitsBatchPublishedV1(CommitsBatchPublishedV1 {
                    repository: repository.to_string(),
                    since: next.last_fetched,
                    commits,
                });
                self.publish(repository, &event).await?;
                let version = self.persist(&next, current.version).await?;
                tracing::info!(
                    %repository,
                    since = %window.since,
                    until = ?window.until,
                    fetched = fetched_count,
                    published,
                    last_fetched = %next.last_fetched,
                    "commits batch published"
                );
                Ok(SyncOutcome {
                    published: true,
                    watermark: Versioned {
                        value: next,
                        version,
                    },
                })
            }
        }
    }

    /// Fetches repository metadata and publishes it. Runs for new intents only.
    pub async fn publish_repository_info(
        &self,
        repository: &RepositoryId,
    ) -> Result<RepositoryInfo, SyncError> {
        let info = retry_with_backoff(self.retry, "fetch_repo", || {
            with_timeout(
                self.call_timeout,
                self.source.fetch_repo(repository),
                UpstreamError::Timeout,
            )
        })
        .await
        .map_err(|source| SyncError::UpstreamUnavailable {
            repository: repository.clone(),
            source,
        })?;

        let event = SyncEvent::RepositoryInfoPublishedV1(RepositoryInfoPublishedV1 {
            info: info.clone(),
        });
        self.publish(repository, &event).await?;
        tracing::info!(%repository, full_name = %info.full_name, "repository info published");
        Ok(info)
    }

    async fn publish(&self, repository: &RepositoryId, event: &SyncEvent) -> Result<(), SyncError> {
        let topic = event.topic();
        let failure = |source| SyncError::BusPublishFailure {
            repository: repository.clone(),
            topic,
            source,
        };
        let payload = serde_json::to_value(event).map_err(|e| failure(BusError::Payload(e)))?;

        let message_id = retry_with_backoff(self.retry, topic, || {
            with_timeout(
                self.call_timeout,
                self.bus.publish(topic, payload.clone()),
                BusError::Timeout,
            )
        })
        .await
        .map_err(failure)?;
        tracing::debug!(%repository, topic, %message_id, "event published");
        Ok(())
    }

    async fn persist(&self, next: &Watermark, loaded_version: u64) -> Result<u64, SyncError> {
        with_timeout(
            self.call_timeout,
            self.store.put(next, Some(loaded_version)),
            StoreError::Timeout,
        )
        .await
        .map_err(|source| SyncError::StoreUnavailable {
            repository: next.repository.clone(),
            source,
        })
    }
}
