use crate::modules::commit_history::adapters::outbound::commit_store::CommitHistoryQueries;
use crate::modules::commit_history::adapters::outbound::commit_store_in_memory::InMemoryCommitStore;
use crate::modules::commit_history::core::aggregation::{CommitFilter, DateRange, Pagination};
use crate::modules::commits_sync::adapters::outbound::commit_source_in_memory::InMemoryCommitSource;
use crate::modules::commits_sync::adapters::outbound::intent_registry_in_memory::InMemoryIntentRegistry;
use crate::modules::commits_sync::adapters::outbound::watermark_store::WatermarkStore;
use crate::modules::commits_sync::adapters::outbound::watermark_store_in_memory::InMemoryWatermarkStore;
use crate::modules::commits_sync::adapters::outbound::watermark_store_json_file::JsonFileWatermarkStore;
use crate::shared::core::primitives::RepositoryId;
use crate::shared::infrastructure::event_bus::in_memory::InMemoryEventBus;
use crate::shared::infrastructure::retry::RetryConfig;
use crate::shell::http::router;
use crate::shell::state::AppState;
use crate::shell::workers::{Adapters, WorkerSettings, spawn_workers};
use crate::tests::fixtures::commits::{CommitBuilder, commits_at, repository_info};
use crate::tests::fixtures::timestamps::at;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct Running {
    source: Arc<InMemoryCommitSource>,
    bus: Arc<InMemoryEventBus>,
    registry: Arc<InMemoryIntentRegistry>,
    commits: Arc<InMemoryCommitStore>,
    shutdown: CancellationToken,
    workers: JoinSet<()>,
}

impl Running {
    async fn start(watermarks: Arc<dyn WatermarkStore>, source: Arc<InMemoryCommitSource>) -> Self {
        let bus = Arc::new(InMemoryEventBus::new(Duration::from_secs(5)));
        let commits = Arc::new(InMemoryCommitStore::new());
        let shutdown = CancellationToken::new();
        let workers = spawn_workers(
            Adapters {
                source: source.clone(),
                bus: bus.clone(),
                watermarks,
                commits: commits.clone(),
            },
            WorkerSettings {
                retry: RetryConfig::NONE,
                redelivery: RetryConfig::new(
                    3,
                    Duration::from_millis(10),
                    Duration::from_millis(50),
                    2.0,
                ),
                call_timeout: Duration::from_secs(1),
                drain_timeout: Duration::from_secs(5),
                max_concurrent_syncs: 4,
                monitoring_interval: Duration::from_millis(50),
            },
            shutdown.clone(),
        )
        .await
        .unwrap();
        Self {
            source,
            bus,
            registry: Arc::new(InMemoryIntentRegistry::new()),
            commits,
            shutdown,
            workers,
        }
    }

    fn state(&self) -> AppState {
        AppState::new(
            self.bus.clone(),
            self.registry.clone(),
            self.commits.clone(),
            Duration::from_secs(1),
        )
    }

    async fn stop(mut self) {
        self.shutdown.cancel();
        while let Some(joined) = self.workers.join_next().await {
            joined.unwrap();
        }
    }

    async fn stored_hashes(&self, repository: &str) -> Vec<String> {
        self.commits
            .find_commits(
                &CommitFilter {
                    repository: RepositoryId::parse(repository).unwrap(),
                    range: DateRange::default(),
                    author: None,
                },
                Pagination::new(None, Some(100)),
            )
            .await
            .unwrap()
            .commits
            .into_iter()
            .map(|c| c.hash)
            .collect()
    }

    async fn wait_for_hashes(&self, repository: &str, expected: usize) -> Vec<String> {
        for _ in 0..200 {
            let hashes = self.stored_hashes(repository).await;
            if hashes.len() >= expected {
                return hashes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{repository} never reached {expected} stored commits");
    }
}

async fn seeded_source() -> Arc<InMemoryCommitSource> {
    let source = Arc::new(InMemoryCommitSource::new());
    let repository = RepositoryId::parse("rust-lang/rust").unwrap();
    source
        .add_repository(&repository, repository_info("rust-lang/rust"))
        .await;
    let commit = |hash: &str, author: &str, hours: i64| {
        CommitBuilder::new("rust-lang/rust")
            .hash(hash)
            .author(author)
            .created_at(at(hours))
            .build()
    };
    source
        .push_commits(
            &repository,
            vec![
                commit("a1", "alice", 1),
                commit("b1", "bob", 2),
                commit("a2", "alice", 3),
                commit("old", "carol", -48),
            ],
        )
        .await;
    source
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
}

#[tokio::test]
async fn mirrors_a_watched_repository_and_ranks_its_committers() {
    let running = Running::start(
        Arc::new(InMemoryWatermarkStore::new()),
        seeded_source().await,
    )
    .await;

    let (status, _) = send(
        running.state(),
        Request::post("/intents")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"repository":"rust-lang/rust","since":"2024-01-01"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let hashes = running.wait_for_hashes("rust-lang/rust", 3).await;
    assert_eq!(hashes, vec!["a2", "b1", "a1"]);

    let (status, ranking) = send(
        running.state(),
        Request::get("/repos/rust-lang/rust/top-committers")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ranking,
        serde_json::json!([
            {"author": "alice", "commit_count": 2},
            {"author": "bob", "commit_count": 1},
        ])
    );

    let repository = RepositoryId::parse("rust-lang/rust").unwrap();
    for _ in 0..200 {
        if running.commits.find_repository(&repository).await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (status, info) = send(
        running.state(),
        Request::get("/repos/rust-lang/rust").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["full_name"], "rust-lang/rust");

    running.stop().await;
}

#[tokio::test]
async fn backfills_when_an_intent_is_moved_into_the_past() {
    let running = Running::start(
        Arc::new(InMemoryWatermarkStore::new()),
        seeded_source().await,
    )
    .await;

    let (status, intent) = send(
        running.state(),
        Request::post("/intents")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"repository":"rust-lang/rust","since":"2024-01-01"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    running.wait_for_hashes("rust-lang/rust", 3).await;

    let id = intent["id"].as_str().unwrap().to_string();
    let (status, updated) = send(
        running.state(),
        Request::put(format!("/intents/{id}"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"since":"2023-12-29"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["since"], "2023-12-29T00:00:00Z");

    let hashes = running.wait_for_hashes("rust-lang/rust", 4).await;
    assert_eq!(hashes.last().map(String::as_str), Some("old"));

    let (status, listed) = send(
        running.state(),
        Request::get("/intents?is_active=true").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], id.as_str());

    running.stop().await;
}

#[tokio::test]
async fn picks_up_new_commits_on_the_sweep_and_resumes_after_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watermarks.json");
    let repository = RepositoryId::parse("rust-lang/rust").unwrap();

    let running = Running::start(
        Arc::new(JsonFileWatermarkStore::open(&path).await.unwrap()),
        seeded_source().await,
    )
    .await;
    running
        .state()
        .register_intent
        .handle("rust-lang/rust", Some(at(0)))
        .await
        .unwrap();
    running.wait_for_hashes("rust-lang/rust", 3).await;

    running
        .source
        .push_commits(&repository, commits_at("rust-lang/rust", &[4]))
        .await;
    let hashes = running.wait_for_hashes("rust-lang/rust", 4).await;
    assert_eq!(hashes[0], "c4");
    let source = running.source.clone();
    running.stop().await;

    let reopened = JsonFileWatermarkStore::open(&path).await.unwrap();
    let stored = reopened.get(&repository).await.unwrap().unwrap();
    assert_eq!(stored.value.since, at(0));
    assert_eq!(stored.value.last_fetched, at(4));

    let calls_before_restart = source.calls().await.len();
    let restarted = Running::start(Arc::new(reopened), source.clone()).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    let resumed = source.calls().await;
    assert!(resumed.len() > calls_before_restart);
    assert!(
        resumed[calls_before_restart..]
            .iter()
            .all(|(_, window)| window.since == at(4))
    );
    restarted.stop().await;
}
