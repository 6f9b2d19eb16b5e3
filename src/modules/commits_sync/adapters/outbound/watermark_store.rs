// Watermark store port.
//
// Purpose
// - Durable mapping from repository to its watermark, the single source of truth for what still
//   needs fetching.
//
// Responsibilities
// - Full overwrite on put, guarded by compare-and-swap on a per-key version.
//
// Testing guidance
// - Use the in memory adapter. The JSON file adapter covers restarts.

use crate::modules::commits_sync::core::watermark::Watermark;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// A stored value with the version it was read at. Versions start at 1 on first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on {key}: expected {expected:?}, actual {actual:?}")]
    VersionConflict {
        key: RepositoryId,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(
        &self,
        repository: &RepositoryId,
    ) -> Result<Option<Versioned<Watermark>>, StoreError>;

    /// Overwrites the watermark if the stored version equals `expected_version` (`None` means
    /// no watermark may exist yet) and returns the new version.
    async fn put(
        &self,
        watermark: &Watermark,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    async fn keys(&self) -> Result<Vec<RepositoryId>, StoreError>;
}

/// Shared compare-and-swap check for adapters; returns the version to write.
pub fn next_version(
    key: &RepositoryId,
    actual: Option<u64>,
    expected: Option<u64>,
) -> Result<u64, StoreError> {
    if actual != expected {
        return Err(StoreError::VersionConflict {
            key: key.clone(),
            expected,
            actual,
        });
    }
    Ok(actual.unwrap_or(0) + 1)
}
