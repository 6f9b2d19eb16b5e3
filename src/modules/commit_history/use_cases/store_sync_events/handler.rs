// Storage consumer: persists what the sync pipeline publishes.
//
// Responsibilities
// - Upsert repositories from repository-info events.
// - Insert commits from commits-batch events, ignoring ones already stored.
//
// Redelivery makes both writes run more than once for the same payload; both are idempotent.
// A batch may arrive before its repository info and is stored regardless.

use crate::modules::commit_history::adapters::outbound::commit_store::CommitHistoryRepository;
use crate::modules::commits_sync::core::events::SyncEvent;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::event_bus::BusMessage;
use crate::shared::infrastructure::event_bus::consumer::DeliveryHandler;
use crate::shared::infrastructure::retry::with_timeout;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const STORAGE_CONSUMER_GROUP: &str = "storage";

#[derive(Debug, Error)]
pub enum StoreSyncEventsError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("commit store failure: {0:#}")]
    Storage(anyhow::Error),
}

pub struct StoreSyncEventsHandler<TRepository>
where
    TRepository: CommitHistoryRepository + ?Sized,
{
    repository: Arc<TRepository>,
    call_timeout: Duration,
}

impl<TRepository> StoreSyncEventsHandler<TRepository>
where
    TRepository: CommitHistoryRepository + ?Sized,
{
    pub fn new(repository: Arc<TRepository>, call_timeout: Duration) -> Self {
        Self {
            repository,
            call_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        future: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, StoreSyncEventsError> {
        with_timeout(self.call_timeout, future, |limit| {
            anyhow::anyhow!("commit store call timed out after {limit:?}")
        })
        .await
        .map_err(StoreSyncEventsError::Storage)
    }
}

#[async_trait]
impl<TRepository> DeliveryHandler for StoreSyncEventsHandler<TRepository>
where
    TRepository: CommitHistoryRepository + ?Sized + 'static,
{
    type Error = StoreSyncEventsError;

    async fn handle(&self, message: &BusMessage) -> Result<(), StoreSyncEventsError> {
        let event: SyncEvent = serde_json::from_value(message.payload.clone())
            .map_err(|e| StoreSyncEventsError::MalformedEvent(format!("{}: {e}", message.topic)))?;

        match event {
            SyncEvent::RepositoryInfoPublishedV1(published) => {
                let full_name = published.info.full_name.clone();
                self.bounded(self.repository.upsert_repository(published.info))
                    .await?;
                tracing::info!(%full_name, "repository stored");
            }
            SyncEvent::CommitsBatchPublishedV1(batch) => {
                let repository = RepositoryId::parse(&batch.repository)
                    .map_err(|e| StoreSyncEventsError::MalformedEvent(e.to_string()))?;
                if let Some(stray) = batch.commits.iter().find(|c| c.repository != repository) {
                    return Err(StoreSyncEventsError::MalformedEvent(format!(
                        "commit {} belongs to {}, not {repository}",
                        stray.hash, stray.repository
                    )));
                }
                let received = batch.commits.len();
                let inserted = self
                    .bounded(self.repository.insert_commits(batch.commits))
                    .await?;
                tracing::info!(%repository, received, inserted, since = %batch.since, "commits stored");
            }
            SyncEvent::SyncIntentSubmittedV1(_) => {
                return Err(StoreSyncEventsError::MalformedEvent(format!(
                    "{}: unexpected event type",
                    message.topic
                )));
            }
        }
        Ok(())
    }

    fn should_redeliver(&self, error: &StoreSyncEventsError) -> bool {
        matches!(error, StoreSyncEventsError::Storage(_))
    }
}

#[cfg(test)]
mod store_sync_events_handler_tests {
    use super::*;
    use crate::modules::commit_history::adapters::outbound::commit_store::CommitHistoryQueries;
    use crate::modules::commit_history::adapters::outbound::commit_store_in_memory::InMemoryCommitStore;
    use crate::modules::commit_history::core::aggregation::{CommitFilter, DateRange, Pagination};
    use crate::modules::commits_sync::core::events::{
        COMMITS_BATCH_PUBLISHED, CommitsBatchPublishedV1, REPOSITORY_INFO_PUBLISHED,
        RepositoryInfoPublishedV1,
    };
    use crate::tests::fixtures::commits::{commits_at, repository_info};
    use crate::tests::fixtures::timestamps::at;
    use chrono::Utc;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use uuid::Uuid;

    fn message(topic: &str, payload: serde_json::Value) -> BusMessage {
        BusMessage {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload,
            published_at: Utc::now(),
        }
    }

    fn batch(repository: &str, hours: &[i64]) -> BusMessage {
        let event = SyncEvent::CommitsBatchPublishedV1(CommitsBatchPublishedV1 {
            repository: repository.into(),
            since: at(0),
            commits: commits_at(repository, hours),
        });
        message(COMMITS_BATCH_PUBLISHED, serde_json::to_value(event).unwrap())
    }

    #[fixture]
    fn before_each() -> (Arc<InMemoryCommitStore>, StoreSyncEventsHandler<InMemoryCommitStore>) {
        let store = Arc::new(InMemoryCommitStore::new());
        let handler = StoreSyncEventsHandler::new(store.clone(), Duration::from_secs(1));
        (store, handler)
    }

    async fn stored_hashes(store: &InMemoryCommitStore, repository: &str) -> Vec<String> {
        store
            .find_commits(
                &CommitFilter {
                    repository: RepositoryId::parse(repository).unwrap(),
                    range: DateRange::default(),
                    author: None,
                },
                Pagination::default(),
            )
            .await
            .unwrap()
            .commits
            .into_iter()
            .map(|c| c.hash)
            .collect()
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_store_a_commits_batch_once(
        before_each: (Arc<InMemoryCommitStore>, StoreSyncEventsHandler<InMemoryCommitStore>),
    ) {
        let (store, handler) = before_each;
        handler.handle(&batch("a/b", &[1, 2])).await.unwrap();
        handler.handle(&batch("a/b", &[1, 2])).await.unwrap();
        assert_eq!(stored_hashes(&store, "a/b").await, vec!["c2", "c1"]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_upsert_repository_info(
        before_each: (Arc<InMemoryCommitStore>, StoreSyncEventsHandler<InMemoryCommitStore>),
    ) {
        let (store, handler) = before_each;
        let event = SyncEvent::RepositoryInfoPublishedV1(RepositoryInfoPublishedV1 {
            info: repository_info("a/b"),
        });
        handler
            .handle(&message(REPOSITORY_INFO_PUBLISHED, serde_json::to_value(event).unwrap()))
            .await
            .unwrap();
        let stored = store
            .find_repository(&RepositoryId::parse("a/b").unwrap())
            .await
            .unwrap();
        assert_eq!(stored, Some(repository_info("a/b")));
    }

    #[rstest]
    #[case(json!("garbage"))]
    #[case(json!({"type": "SyncIntentSubmittedV1", "repository": "a/b"}))]
    #[case(json!({"type": "CommitsBatchPublishedV1", "repository": "nope", "since": "2024-01-01T00:00:00Z", "commits": []}))]
    #[tokio::test]
    async fn it_should_reject_malformed_events_without_redelivery(
        before_each: (Arc<InMemoryCommitStore>, StoreSyncEventsHandler<InMemoryCommitStore>),
        #[case] payload: serde_json::Value,
    ) {
        let (_, handler) = before_each;
        let error = handler
            .handle(&message(COMMITS_BATCH_PUBLISHED, payload))
            .await
            .unwrap_err();
        assert!(matches!(error, StoreSyncEventsError::MalformedEvent(_)));
        assert!(!handler.should_redeliver(&error));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_request_redelivery_when_the_store_is_offline() {
        let mut store = InMemoryCommitStore::new();
        store.toggle_offline();
        let handler = StoreSyncEventsHandler::new(Arc::new(store), Duration::from_secs(1));
        let error = handler.handle(&batch("a/b", &[1])).await.unwrap_err();
        assert!(handler.should_redeliver(&error));
    }
}
