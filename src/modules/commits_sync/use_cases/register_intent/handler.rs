// Accepts a watch request from the inbound surface, puts it on the bus and records it.
//
// The identifier is validated here so callers get immediate feedback; the intent consumer
// validates again because the bus accepts any payload.
//
// The intent is recorded only after the bus took it, so a failed submission leaves the registry
// untouched. Resubmitting a repository reactivates its intent under the same id.

use crate::modules::commits_sync::adapters::outbound::intent_registry::{
    IntentRegistry, RegistryError,
};
use crate::modules::commits_sync::core::events::{
    INTENT_SUBMITTED, SyncEvent, SyncIntentSubmittedV1,
};
use crate::modules::commits_sync::core::intent::WatchIntent;
use crate::shared::core::primitives::{InvalidRepositoryIdentifier, RepositoryId};
use crate::shared::infrastructure::event_bus::{BusError, EventBus, publish_json};
use crate::shared::infrastructure::retry::with_timeout;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegisterIntentError {
    #[error(transparent)]
    InvalidRepository(#[from] InvalidRepositoryIdentifier),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Publishes the intent-submitted event for `intent`.
pub async fn announce<TBus>(
    bus: &TBus,
    call_timeout: Duration,
    intent: &WatchIntent,
) -> Result<(), BusError>
where
    TBus: EventBus + ?Sized,
{
    let event = SyncEvent::SyncIntentSubmittedV1(SyncIntentSubmittedV1 {
        repository: intent.repository.to_string(),
        since: Some(intent.since),
    });
    let message_id = with_timeout(
        call_timeout,
        publish_json(bus, INTENT_SUBMITTED, &event),
        BusError::Timeout,
    )
    .await?;
    tracing::info!(
        repository = %intent.repository,
        since = %intent.since,
        intent_id = %intent.id,
        %message_id,
        "watch intent submitted"
    );
    Ok(())
}

pub struct RegisterIntentHandler<TBus, TRegistry>
where
    TBus: EventBus + ?Sized,
    TRegistry: IntentRegistry + ?Sized,
{
    bus: Arc<TBus>,
    registry: Arc<TRegistry>,
    call_timeout: Duration,
}

impl<TBus, TRegistry> RegisterIntentHandler<TBus, TRegistry>
where
    TBus: EventBus + ?Sized,
    TRegistry: IntentRegistry + ?Sized,
{
    pub fn new(bus: Arc<TBus>, registry: Arc<TRegistry>, call_timeout: Duration) -> Self {
        Self {
            bus,
            registry,
            call_timeout,
        }
    }

    /// Publishes and records the intent. A missing `since` means "from now on".
    pub async fn handle(
        &self,
        repository: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<WatchIntent, RegisterIntentError> {
        let repository = RepositoryId::parse(repository.trim())?;
        let since = since.unwrap_or_else(Utc::now);

        let existing = with_timeout(
            self.call_timeout,
            self.registry.find_by_repository(&repository),
            RegistryError::Timeout,
        )
        .await?;
        let intent = match existing {
            Some(mut intent) => {
                intent.since = since;
                intent.is_active = true;
                intent
            }
            None => WatchIntent::new(repository, since),
        };

        announce(self.bus.as_ref(), self.call_timeout, &intent).await?;
        with_timeout(
            self.call_timeout,
            self.registry.save(&intent),
            RegistryError::Timeout,
        )
        .await?;

        Ok(intent)
    }
}
