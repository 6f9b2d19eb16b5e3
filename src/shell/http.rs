use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::modules::commit_history::use_cases::query_commit_history::inbound::http as history_http;
use crate::modules::commits_sync::use_cases::manage_intents::inbound::http as intents_http;
use crate::modules::commits_sync::use_cases::register_intent::inbound::http as register_http;
use crate::shell::graphql::{graphiql, graphql, schema};
use crate::shell::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/intents",
            post(register_http::handle).get(intents_http::list),
        )
        .route(
            "/intents/{id}",
            get(intents_http::get).put(intents_http::update),
        )
        .route("/repos/{owner}/{name}", get(history_http::repository_info))
        .route(
            "/repos/{owner}/{name}/top-committers",
            get(history_http::top_committers),
        )
        .route("/repos/{owner}/{name}/commits", get(history_http::commits))
        .route("/gql", get(graphiql).post(graphql))
        .layer(Extension(schema(state.clone())))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod router_tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::modules::commit_history::adapters::outbound::commit_store_in_memory::InMemoryCommitStore;
    use crate::modules::commits_sync::adapters::outbound::intent_registry_in_memory::InMemoryIntentRegistry;
    use crate::modules::commits_sync::core::events::INTENT_SUBMITTED;
    use crate::shared::infrastructure::event_bus::in_memory::InMemoryEventBus;
    use crate::shell::state::AppState;

    use super::router;

    fn make_test_state(bus: Arc<InMemoryEventBus>) -> AppState {
        AppState::new(
            bus,
            Arc::new(InMemoryIntentRegistry::new()),
            Arc::new(InMemoryCommitStore::new()),
            Duration::from_secs(1),
        )
    }

    async fn gql(bus: Arc<InMemoryEventBus>, query: &str) -> serde_json::Value {
        let body = serde_json::json!({ "query": query }).to_string();
        let response = router(make_test_state(bus))
            .oneshot(
                Request::post("/gql")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn it_should_answer_the_health_check() {
        let response = router(make_test_state(Arc::new(InMemoryEventBus::default())))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn it_should_submit_an_intent_through_graphql() {
        let bus = Arc::new(InMemoryEventBus::default());
        let json = gql(
            bus.clone(),
            r#"mutation { watchRepository(repository: "a/b", since: "2024-01-01") { repository since } }"#,
        )
        .await;

        assert_eq!(json["data"]["watchRepository"]["repository"], "a/b");
        assert_eq!(bus.published(INTENT_SUBMITTED).await.len(), 1);
    }

    #[tokio::test]
    async fn it_should_report_graphql_errors_for_a_malformed_repository() {
        let bus = Arc::new(InMemoryEventBus::default());
        let json = gql(
            bus.clone(),
            r#"mutation { watchRepository(repository: "nope") { repository } }"#,
        )
        .await;

        assert!(json["errors"].as_array().is_some_and(|e| !e.is_empty()));
        assert!(bus.published(INTENT_SUBMITTED).await.is_empty());
    }

    #[tokio::test]
    async fn it_should_list_and_update_intents_through_graphql() {
        let state = make_test_state(Arc::new(InMemoryEventBus::default()));
        let registered = state.register_intent.handle("a/b", None).await.unwrap();
        let schema = crate::shell::graphql::schema(state);

        let listed = schema
            .execute("{ intents(isActive: true) { id repository isActive } }")
            .await
            .into_result()
            .unwrap()
            .data
            .into_json()
            .unwrap();
        assert_eq!(listed["intents"][0]["id"], registered.id.to_string());

        let mutation = format!(
            r#"mutation {{ updateIntent(id: "{}", isActive: false) {{ isActive }} }}"#,
            registered.id
        );
        let updated = schema
            .execute(mutation)
            .await
            .into_result()
            .unwrap()
            .data
            .into_json()
            .unwrap();
        assert_eq!(updated["updateIntent"]["isActive"], false);
    }

    #[tokio::test]
    async fn it_should_serve_intent_management_routes() {
        let response = router(make_test_state(Arc::new(InMemoryEventBus::default())))
            .oneshot(Request::get("/intents?is_active=true").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn it_should_query_top_committers_through_graphql() {
        let json = gql(
            Arc::new(InMemoryEventBus::default()),
            r#"{ topCommitters(repository: "a/b") { author commitCount } }"#,
        )
        .await;

        assert_eq!(json["data"]["topCommitters"], serde_json::json!([]));
    }
}
