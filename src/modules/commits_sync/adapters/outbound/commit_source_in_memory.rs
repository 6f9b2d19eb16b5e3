// In memory implementation of the CommitSource port.
//
// Purpose
// - Drive pipeline and scheduler tests with a controllable upstream.
//
// Responsibilities
// - Serve a repository's history filtered to the requested window, newest-first.
// - Serve scripted one-shot responses as-is, ahead of the history, to model upstream quirks.
// - Fail on demand: offline, or for the next N calls.
// - Answer fetch_commits after a fixed latency, to model a slow upstream.

use crate::modules::commits_sync::adapters::outbound::commit_source::{
    CommitSource, UpstreamError,
};
use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use crate::modules::commits_sync::core::fetch_window::FetchWindow;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryCommitSource {
    repositories: Mutex<HashMap<RepositoryId, RepositoryInfo>>,
    history: Mutex<HashMap<RepositoryId, Vec<CommitRecord>>>,
    scripted: Mutex<HashMap<RepositoryId, VecDeque<Vec<CommitRecord>>>>,
    calls: Mutex<Vec<(RepositoryId, FetchWindow)>>,
    failures_remaining: AtomicU32,
    offline: AtomicBool,
    latency: Duration,
}

impl InMemoryCommitSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn add_repository(&self, repository: &RepositoryId, info: RepositoryInfo) {
        self.repositories
            .lock()
            .await
            .insert(repository.clone(), info);
    }

    /// Appends commits to the repository's history.
    pub async fn push_commits(&self, repository: &RepositoryId, commits: Vec<CommitRecord>) {
        let mut history = self.history.lock().await;
        let entry = history.entry(repository.clone()).or_default();
        entry.extend(commits);
        entry.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Queues a response returned verbatim by the next fetch for `repository`.
    pub async fn respond_with(&self, repository: &RepositoryId, commits: Vec<CommitRecord>) {
        self.scripted
            .lock()
            .await
            .entry(repository.clone())
            .or_default()
            .push_back(commits);
    }

    /// Makes the next `times` calls fail with a transient transport error.
    pub fn fail_times(&self, times: u32) {
        self.failures_remaining.store(times, Ordering::SeqCst);
    }

    pub fn toggle_offline(&self) {
        self.offline.fetch_xor(true, Ordering::SeqCst);
    }

    /// Every fetch_commits call so far, in call order.
    pub async fn calls(&self) -> Vec<(RepositoryId, FetchWindow)> {
        self.calls.lock().await.clone()
    }

    fn check_available(&self) -> Result<(), UpstreamError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(UpstreamError::Transport("Commit source offline".into()));
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(UpstreamError::Transport("Commit source flaked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommitSource for InMemoryCommitSource {
    async fn fetch_repo(&self, repository: &RepositoryId) -> Result<RepositoryInfo, UpstreamError> {
        self.check_available()?;
        self.repositories
            .lock()
            .await
            .get(repository)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(repository.clone()))
    }

    async fn fetch_commits(
        &self,
        repository: &RepositoryId,
        window: FetchWindow,
    ) -> Result<Vec<CommitRecord>, UpstreamError> {
        self.calls.lock().await.push((repository.clone(), window));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.check_available()?;

        if let Some(response) = self
            .scripted
            .lock()
            .await
            .get_mut(repository)
            .and_then(VecDeque::pop_front)
        {
            return Ok(response);
        }

        Ok(self
            .history
            .lock()
            .await
            .get(repository)
            .map(|commits| {
                commits
                    .iter()
                    .filter(|c| c.created_at >= window.since)
                    .filter(|c| window.until.is_none_or(|until| c.created_at <= until))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
