// A watch intent as the service remembers it after submission.
//
// Invariants
// - One intent per repository; resubmitting keeps the id and overwrites since.
// - An update re-announces the intent only when it ends up active and either its since moved or it
//   was just reactivated. Deactivating is recorded and never announced.

use crate::shared::core::primitives::RepositoryId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchIntent {
    pub id: Uuid,
    pub repository: RepositoryId,
    pub since: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentChange {
    pub since: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl WatchIntent {
    pub fn new(repository: RepositoryId, since: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            repository,
            since,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Applies the change and reports whether the intent must be announced again.
    pub fn apply(&mut self, change: IntentChange) -> bool {
        let was_active = self.is_active;
        let previous_since = self.since;
        if let Some(since) = change.since {
            self.since = since;
        }
        if let Some(is_active) = change.is_active {
            self.is_active = is_active;
        }
        self.is_active && (!was_active || self.since != previous_since)
    }
}
