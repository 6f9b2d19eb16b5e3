use async_graphql::{Context, Object, Result as GqlResult};
use uuid::Uuid;

use crate::modules::commits_sync::core::intent::IntentChange;
use crate::modules::commits_sync::use_cases::manage_intents::handler::ManageIntentsError;
use crate::modules::commits_sync::use_cases::register_intent::inbound::graphql::GqlWatchIntent;
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

fn gql_error(e: ManageIntentsError) -> async_graphql::Error {
    async_graphql::Error::new(e.to_string())
}

#[derive(Default)]
pub struct IntentsQuery;

#[Object]
impl IntentsQuery {
    async fn intents(
        &self,
        context: &Context<'_>,
        is_active: Option<bool>,
    ) -> GqlResult<Vec<GqlWatchIntent>> {
        let state = context.data_unchecked::<AppState>();
        let intents = state.intents.list(is_active).await.map_err(gql_error)?;
        Ok(intents.into_iter().map(Into::into).collect())
    }

    async fn intent(&self, context: &Context<'_>, id: Uuid) -> GqlResult<Option<GqlWatchIntent>> {
        let state = context.data_unchecked::<AppState>();
        match state.intents.get(id).await {
            Ok(intent) => Ok(Some(intent.into())),
            Err(ManageIntentsError::NotFound(_)) => Ok(None),
            Err(e) => Err(gql_error(e)),
        }
    }
}

#[derive(Default)]
pub struct IntentsMutation;

#[Object]
impl IntentsMutation {
    /// Moves `since` or toggles the intent; an active intent with a new window is resubmitted.
    async fn update_intent(
        &self,
        context: &Context<'_>,
        id: Uuid,
        since: Option<String>,
        is_active: Option<bool>,
    ) -> GqlResult<GqlWatchIntent> {
        let state = context.data_unchecked::<AppState>();
        let change = IntentChange {
            since: parse_optional(since.as_deref(), DayEdge::Start)?,
            is_active,
        };
        let intent = state.intents.update(id, change).await.map_err(gql_error)?;
        Ok(intent.into())
    }
}
