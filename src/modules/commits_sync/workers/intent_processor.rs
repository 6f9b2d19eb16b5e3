// Intent consumer: handles one intent-submitted delivery.
//
// Steps: decode, validate the identifier, take the repository lock, reconcile the watermark,
// publish repository info, then run one sync cycle right away.

use crate::modules::commits_sync::adapters::outbound::commit_source::CommitSource;
use crate::modules::commits_sync::adapters::outbound::watermark_store::WatermarkStore;
use crate::modules::commits_sync::core::events::SyncEvent;
use crate::modules::commits_sync::use_cases::errors::SyncError;
use crate::modules::commits_sync::use_cases::reconcile_watermark::handler::ReconcileWatermarkHandler;
use crate::modules::commits_sync::use_cases::sync_repository::handler::SyncPipeline;
use crate::modules::commits_sync::workers::repository_locks::RepositoryLocks;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::event_bus::{BusMessage, EventBus};
use crate::shared::infrastructure::event_bus::consumer::DeliveryHandler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const INTENT_CONSUMER_GROUP: &str = "intent-processor";

pub struct IntentProcessor<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    reconciler: ReconcileWatermarkHandler<TStore>,
    pipeline: Arc<SyncPipeline<TSource, TBus, TStore>>,
    locks: Arc<RepositoryLocks>,
}

impl<TSource, TBus, TStore> IntentProcessor<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized,
    TBus: EventBus + ?Sized,
    TStore: WatermarkStore + ?Sized,
{
    pub fn new(
        pipeline: Arc<SyncPipeline<TSource, TBus, TStore>>,
        locks: Arc<RepositoryLocks>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            reconciler: ReconcileWatermarkHandler::new(pipeline.store().clone(), call_timeout),
            pipeline,
            locks,
        }
    }
}

/// Decodes and validates an intent payload. Both failure kinds are permanent.
pub fn decode_intent(
    message: &BusMessage,
) -> Result<(RepositoryId, Option<DateTime<Utc>>), SyncError> {
    let event: SyncEvent = serde_json::from_value(message.payload.clone())
        .map_err(|e| SyncError::MalformedEvent(format!("{}: {e}", message.topic)))?;
    let SyncEvent::SyncIntentSubmittedV1(intent) = event else {
        return Err(SyncError::MalformedEvent(format!(
            "{}: unexpected event type",
            message.topic
        )));
    };
    let repository = RepositoryId::parse(&intent.repository)?;
    Ok((repository, intent.since))
}

#[async_trait]
impl<TSource, TBus, TStore> DeliveryHandler for IntentProcessor<TSource, TBus, TStore>
where
    TSource: CommitSource + ?Sized + 'static,
    TBus: EventBus + ?Sized + 'static,
    TStore: WatermarkStore + ?Sized + 'static,
{
    type Error = SyncError;

    async fn handle(&self, message: &BusMessage) -> Result<(), SyncError> {
        let (repository, since) = decode_intent(message)?;
        let _guard = self.locks.lock(&repository).await;

        let watermark = self.reconciler.handle(&repository, since).await?;
        self.pipeline.publish_repository_info(&repository).await?;
        let outcome = self.pipeline.sync_once(watermark).await?;
        tracing::info!(
            %repository,
            published = outcome.published,
            last_fetched = %outcome.watermark.value.last_fetched,
            "intent processed"
        );
        Ok(())
    }

    fn should_redeliver(&self, error: &SyncError) -> bool {
        error.is_retryable()
    }
}
