use async_graphql::http::GraphiQLSource;
use async_graphql::{EmptySubscription, MergedObject, Schema};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{Extension, response::Html};

use crate::modules::commit_history::use_cases::query_commit_history::inbound::graphql::CommitHistoryQuery;
use crate::modules::commits_sync::use_cases::manage_intents::inbound::graphql::{
    IntentsMutation, IntentsQuery,
};
use crate::modules::commits_sync::use_cases::register_intent::inbound::graphql::WatchRepositoryMutation;
pub use crate::shell::state::AppState;

#[derive(MergedObject, Default)]
pub struct QueryRoot(CommitHistoryQuery, IntentsQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(WatchRepositoryMutation, IntentsMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(state)
        .finish()
}

pub async fn graphql(
    Extension(schema): Extension<AppSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

pub async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/gql").finish())
}
