// Lists, inspects and changes recorded watch intents.
//
// An update that leaves the intent active with a new since, or reactivates it, is published again
// so the intent consumer reconciles the watermark. Deactivation is recorded only; the watermark
// stays and the periodic sweep keeps it fresh.

use crate::modules::commits_sync::adapters::outbound::intent_registry::{
    IntentRegistry, RegistryError,
};
use crate::modules::commits_sync::core::intent::{IntentChange, WatchIntent};
use crate::modules::commits_sync::use_cases::register_intent::handler::announce;
use crate::shared::infrastructure::event_bus::{BusError, EventBus};
use crate::shared::infrastructure::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ManageIntentsError {
    #[error("no intent with id {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

pub struct ManageIntentsHandler<TBus, TRegistry>
where
    TBus: EventBus + ?Sized,
    TRegistry: IntentRegistry + ?Sized,
{
    bus: Arc<TBus>,
    registry: Arc<TRegistry>,
    call_timeout: Duration,
}

impl<TBus, TRegistry> ManageIntentsHandler<TBus, TRegistry>
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

    pub async fn list(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<WatchIntent>, ManageIntentsError> {
        let intents = with_timeout(
            self.call_timeout,
            self.registry.list(is_active),
            RegistryError::Timeout,
        )
        .await?;
        Ok(intents)
    }

    pub async fn get(&self, id: Uuid) -> Result<WatchIntent, ManageIntentsError> {
        with_timeout(
            self.call_timeout,
            self.registry.find(id),
            RegistryError::Timeout,
        )
        .await?
        .ok_or(ManageIntentsError::NotFound(id))
    }

    pub async fn update(
        &self,
        id: Uuid,
        change: IntentChange,
    ) -> Result<WatchIntent, ManageIntentsError> {
        let mut intent = self.get(id).await?;
        if intent.apply(change) {
            announce(self.bus.as_ref(), self.call_timeout, &intent).await?;
        }
        with_timeout(
            self.call_timeout,
            self.registry.save(&intent),
            RegistryError::Timeout,
        )
        .await?;
        tracing::info!(
            intent_id = %intent.id,
            repository = %intent.repository,
            since = %intent.since,
            is_active = intent.is_active,
            "watch intent updated"
        );
        Ok(intent)
    }
}
