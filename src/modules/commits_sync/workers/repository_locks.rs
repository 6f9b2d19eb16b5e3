// Keyed single-writer locks so that at most one task works on a repository at a time.

use crate::shared::core::primitives::RepositoryId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct RepositoryLocks {
    locks: Mutex<HashMap<RepositoryId, Arc<Mutex<()>>>>,
}

impl RepositoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `repository`. Released when the guard drops.
    pub async fn lock(&self, repository: &RepositoryId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(repository.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
