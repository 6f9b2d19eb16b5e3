// Watermark is the persisted cursor tracking how much of a repository's history is synchronized.
//
// Purpose
// - Encode the sync mode as an explicit variant instead of an "empty until" sentinel.
//
// Invariants
// - last_fetched is the inclusive lower bound of the next fetch window.
// - Backfilling { until } bounds the current window; once drained the watermark returns to Forward.
// - Exactly one watermark per repository, keyed by its identifier.

use crate::shared::core::primitives::RepositoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncWindow {
    Forward,
    Backfilling { until: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub repository: RepositoryId,
    pub since: DateTime<Utc>,
    #[serde(flatten)]
    pub window: SyncWindow,
    pub last_fetched: DateTime<Utc>,
}

impl Watermark {
    pub fn forward(repository: RepositoryId, since: DateTime<Utc>) -> Self {
        Self {
            repository,
            since,
            window: SyncWindow::Forward,
            last_fetched: since,
        }
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self.window {
            SyncWindow::Forward => None,
            SyncWindow::Backfilling { until } => Some(until),
        }
    }
}
