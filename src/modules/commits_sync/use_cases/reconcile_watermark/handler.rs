// Applies a watch intent to the stored watermark.
//
// Loads the current watermark, merges the request with the pure reconcile rules and writes the
// result back with compare-and-swap. A concurrent writer causes a reload and a fresh merge, up
// to a bounded number of attempts.

use crate::modules::commits_sync::adapters::outbound::watermark_store::{
    StoreError, Versioned, WatermarkStore,
};
use crate::modules::commits_sync::core::reconcile::reconcile;
use crate::modules::commits_sync::core::watermark::Watermark;
use crate::modules::commits_sync::use_cases::errors::SyncError;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::retry::with_timeout;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct ReconcileWatermarkHandler<TStore>
where
    TStore: WatermarkStore + ?Sized,
{
    store: Arc<TStore>,
    call_timeout: Duration,
    max_attempts: u32,
}

impl<TStore> ReconcileWatermarkHandler<TStore>
where
    TStore: WatermarkStore + ?Sized,
{
    pub fn new(store: Arc<TStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn handle(
        &self,
        repository: &RepositoryId,
        requested_since: Option<DateTime<Utc>>,
    ) -> Result<Versioned<Watermark>, SyncError> {
        let unavailable = |source| SyncError::StoreUnavailable {
            repository: repository.clone(),
            source,
        };

        let mut attempt = 1;
        loop {
            let existing = with_timeout(
                self.call_timeout,
                self.store.get(repository),
                StoreError::Timeout,
            )
            .await
            .map_err(unavailable)?;
            let loaded_version = existing.as_ref().map(|v| v.version);

            let reconciliation = reconcile(existing.map(|v| v.value), repository, requested_since);
            let label = reconciliation.label();
            if !reconciliation.requires_write() {
                tracing::debug!(%repository, outcome = label, "watermark unchanged");
                return Ok(Versioned {
                    value: reconciliation.into_watermark(),
                    version: loaded_version.unwrap_or_default(),
                });
            }

            let watermark = reconciliation.into_watermark();
            let written = with_timeout(
                self.call_timeout,
                self.store.put(&watermark, loaded_version),
                StoreError::Timeout,
            )
            .await;

            match written {
                Ok(version) => {
                    tracing::info!(
                        %repository,
                        outcome = label,
                        since = %watermark.since,
                        until = ?watermark.until(),
                        last_fetched = %watermark.last_fetched,
                        "watermark reconciled"
                    );
                    return Ok(Versioned {
                        value: watermark,
                        version,
                    });
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_attempts => {
                    tracing::debug!(%repository, attempt, "watermark changed concurrently, re-merging");
                    attempt += 1;
                }
                Err(error) => return Err(unavailable(error)),
            }
        }
    }
}
