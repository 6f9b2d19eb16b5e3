// Upstream commit source port.
//
// Purpose
// - Read repository metadata and commit history from the hosting API.
//
// Responsibilities
// - Return commits newest-first for an inclusive window, with every page drained.
// - Classify failures so the pipeline knows which ones are worth retrying.

use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use crate::modules::commits_sync::core::fetch_window::FetchWindow;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::retry::Retryable;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("repository {0} not found upstream")]
    NotFound(RepositoryId),

    #[error("could not decode upstream response: {0}")]
    Decode(String),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// The listing had more pages than the source follows. The missing pages hold the oldest
    /// commits of the window, so a partial listing must not reach the pipeline.
    #[error("commit listing for {repository} exceeds {max_pages} pages")]
    Truncated {
        repository: RepositoryId,
        max_pages: usize,
    },
}

impl Retryable for UpstreamError {
    fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Transport(_) | UpstreamError::Timeout(_) => true,
            // 403 and 429 are how the API reports rate limiting.
            UpstreamError::Status { status, .. } => {
                *status >= 500 || *status == 429 || *status == 403
            }
            UpstreamError::NotFound(_)
            | UpstreamError::Decode(_)
            | UpstreamError::Truncated { .. } => false,
        }
    }
}

#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn fetch_repo(&self, repository: &RepositoryId) -> Result<RepositoryInfo, UpstreamError>;

    async fn fetch_commits(
        &self,
        repository: &RepositoryId,
        window: FetchWindow,
    ) -> Result<Vec<CommitRecord>, UpstreamError>;
}
