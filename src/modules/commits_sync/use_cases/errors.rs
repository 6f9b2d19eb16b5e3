use crate::modules::commits_sync::adapters::outbound::commit_source::UpstreamError;
use crate::modules::commits_sync::adapters::outbound::watermark_store::StoreError;
use crate::shared::core::primitives::{InvalidRepositoryIdentifier, RepositoryId};
use crate::shared::infrastructure::event_bus::BusError;
use crate::shared::infrastructure::retry::Retryable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("upstream unavailable for {repository}: {source}")]
    UpstreamUnavailable {
        repository: RepositoryId,
        source: UpstreamError,
    },

    #[error(transparent)]
    InvalidRepositoryIdentifier(#[from] InvalidRepositoryIdentifier),

    #[error("watermark store unavailable for {repository}: {source}")]
    StoreUnavailable {
        repository: RepositoryId,
        source: StoreError,
    },

    #[error("could not publish {topic} for {repository}: {source}")]
    BusPublishFailure {
        repository: RepositoryId,
        topic: &'static str,
        source: BusError,
    },

    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl SyncError {
    /// Whether handling the same message again may succeed. Drives ack or nack.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::UpstreamUnavailable { source, .. } => source.is_transient(),
            SyncError::StoreUnavailable { .. } => true,
            SyncError::BusPublishFailure { source, .. } => !matches!(source, BusError::Payload(_)),
            SyncError::InvalidRepositoryIdentifier(_) | SyncError::MalformedEvent(_) => false,
        }
    }
}
