// In memory commit history store.
//
// Purpose
// - Hold mirrored repositories and commits for the read side without a database.
//
// Responsibilities
// - Upsert repositories keyed by full name, matched case-insensitively as the upstream does.
// - Insert commits once per (repository, hash), keeping insertion order for ranking ties.
// - Answer the aggregation queries.

use crate::modules::commit_history::adapters::outbound::commit_store::{
    CommitHistoryQueries, CommitHistoryRepository,
};
use crate::modules::commit_history::core::aggregation::{
    self, AuthorStat, CommitFilter, CommitPage, DateRange, Pagination,
};
use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    repositories: HashMap<String, RepositoryInfo>,
    commits: Vec<CommitRecord>,
    commit_keys: HashSet<(RepositoryId, String)>,
}

#[derive(Default)]
pub struct InMemoryCommitStore {
    tables: RwLock<Tables>,
    is_offline: bool,
}

impl InMemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    fn ensure_online(&self) -> anyhow::Result<()> {
        if self.is_offline {
            anyhow::bail!("Commit store offline");
        }
        Ok(())
    }
}

fn repository_key(full_name: &str) -> String {
    full_name.to_lowercase()
}

#[async_trait]
impl CommitHistoryRepository for InMemoryCommitStore {
    async fn upsert_repository(&self, info: RepositoryInfo) -> anyhow::Result<()> {
        self.ensure_online()?;
        self.tables
            .write()
            .await
            .repositories
            .insert(repository_key(&info.full_name), info);
        Ok(())
    }

    async fn insert_commits(&self, commits: Vec<CommitRecord>) -> anyhow::Result<usize> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for commit in commits {
            let key = (commit.repository.clone(), commit.hash.clone());
            if tables.commit_keys.insert(key) {
                tables.commits.push(commit);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl CommitHistoryQueries for InMemoryCommitStore {
    async fn find_repository(
        &self,
        repository: &RepositoryId,
    ) -> anyhow::Result<Option<RepositoryInfo>> {
        self.ensure_online()?;
        Ok(self
            .tables
            .read()
            .await
            .repositories
            .get(&repository_key(&repository.full_name()))
            .cloned())
    }

    async fn top_committers(
        &self,
        repository: &RepositoryId,
        range: DateRange,
        pagination: Pagination,
    ) -> anyhow::Result<Vec<AuthorStat>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let commits = tables.commits.iter().filter(|c| &c.repository == repository);
        Ok(aggregation::top_committers(commits, range, pagination))
    }

    async fn find_commits(
        &self,
        filter: &CommitFilter,
        pagination: Pagination,
    ) -> anyhow::Result<CommitPage> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(aggregation::find_commits(&tables.commits, filter, pagination))
    }
}
