use crate::modules::commits_sync::adapters::outbound::intent_registry::{
    IntentRegistry, RegistryError,
};
use crate::modules::commits_sync::core::intent::WatchIntent;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Ids are v7, so iterating the map walks intents in creation order.
#[derive(Default)]
pub struct InMemoryIntentRegistry {
    inner: RwLock<BTreeMap<Uuid, WatchIntent>>,
    offline: bool,
}

impl InMemoryIntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.offline = !self.offline;
    }

    fn ensure_online(&self) -> Result<(), RegistryError> {
        if self.offline {
            return Err(RegistryError::Backend("Intent registry offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IntentRegistry for InMemoryIntentRegistry {
    async fn find(&self, id: Uuid) -> Result<Option<WatchIntent>, RegistryError> {
        self.ensure_online()?;
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn find_by_repository(
        &self,
        repository: &RepositoryId,
    ) -> Result<Option<WatchIntent>, RegistryError> {
        self.ensure_online()?;
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|intent| &intent.repository == repository)
            .cloned())
    }

    async fn list(&self, is_active: Option<bool>) -> Result<Vec<WatchIntent>, RegistryError> {
        self.ensure_online()?;
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|intent| is_active.is_none_or(|active| intent.is_active == active))
            .cloned()
            .collect())
    }

    async fn save(&self, intent: &WatchIntent) -> Result<(), RegistryError> {
        self.ensure_online()?;
        self.inner.write().await.insert(intent.id, intent.clone());
        Ok(())
    }
}
