// Intent registry port.
//
// Purpose
// - Remember submitted intents so they can be listed, inspected and changed after the fact.
//
// Responsibilities
// - Keyed by intent id, at most one intent per repository.
// - save overwrites by id.

use crate::modules::commits_sync::core::intent::WatchIntent;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait IntentRegistry: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<WatchIntent>, RegistryError>;

    async fn find_by_repository(
        &self,
        repository: &RepositoryId,
    ) -> Result<Option<WatchIntent>, RegistryError>;

    /// Oldest first. `None` lists every intent.
    async fn list(&self, is_active: Option<bool>) -> Result<Vec<WatchIntent>, RegistryError>;

    async fn save(&self, intent: &WatchIntent) -> Result<(), RegistryError>;
}
