// Versioned bus payloads exchanged between the intake, the sync pipeline and the storage consumer.
//
// Field names are preserved on the wire; topics route by payload kind.

use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INTENT_SUBMITTED: &str = "intent-submitted";
pub const REPOSITORY_INFO_PUBLISHED: &str = "repository-info-published";
pub const COMMITS_BATCH_PUBLISHED: &str = "commits-batch-published";

/// Raw watch intent as it travels on the bus. The identifier is validated by the consumer, so a
/// malformed value still decodes and can be acknowledged instead of redelivered forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIntentSubmittedV1 {
    pub repository: String,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfoPublishedV1 {
    pub info: RepositoryInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitsBatchPublishedV1 {
    pub repository: String,
    pub since: DateTime<Utc>,
    pub commits: Vec<CommitRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    SyncIntentSubmittedV1(SyncIntentSubmittedV1),
    RepositoryInfoPublishedV1(RepositoryInfoPublishedV1),
    CommitsBatchPublishedV1(CommitsBatchPublishedV1),
}

impl SyncEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            SyncEvent::SyncIntentSubmittedV1(_) => INTENT_SUBMITTED,
            SyncEvent::RepositoryInfoPublishedV1(_) => REPOSITORY_INFO_PUBLISHED,
            SyncEvent::CommitsBatchPublishedV1(_) => COMMITS_BATCH_PUBLISHED,
        }
    }
}
