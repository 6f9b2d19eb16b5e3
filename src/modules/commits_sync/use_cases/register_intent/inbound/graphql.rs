use async_graphql::{Context, Object, Result as GqlResult, SimpleObject};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::modules::commits_sync::core::intent::WatchIntent;
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

#[derive(SimpleObject, Clone)]
pub struct GqlWatchIntent {
    pub id: Uuid,
    pub repository: String,
    pub since: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WatchIntent> for GqlWatchIntent {
    fn from(intent: WatchIntent) -> Self {
        Self {
            id: intent.id,
            repository: intent.repository.to_string(),
            since: intent.since,
            is_active: intent.is_active,
            created_at: intent.created_at,
        }
    }
}

#[derive(Default)]
pub struct WatchRepositoryMutation;

#[Object]
impl WatchRepositoryMutation {
    /// Starts or widens the mirror of `repository` ("owner/name") from `since`, or from now.
    async fn watch_repository(
        &self,
        context: &Context<'_>,
        repository: String,
        since: Option<String>,
    ) -> GqlResult<GqlWatchIntent> {
        let state = context.data_unchecked::<AppState>();
        let since = parse_optional(since.as_deref(), DayEdge::Start)?;

        let registered = state
            .register_intent
            .handle(&repository, since)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;

        Ok(registered.into())
    }
}
