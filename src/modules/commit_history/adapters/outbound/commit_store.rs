use crate::modules::commit_history::core::aggregation::{
    AuthorStat, CommitFilter, CommitPage, DateRange, Pagination,
};
use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;

#[async_trait]
pub trait CommitHistoryRepository: Send + Sync {
    /// Inserts or replaces the repository keyed by `full_name`.
    async fn upsert_repository(&self, info: RepositoryInfo) -> anyhow::Result<()>;

    /// Inserts commits, ignoring any `(repository, hash)` already stored. Returns how many were new.
    async fn insert_commits(&self, commits: Vec<CommitRecord>) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait CommitHistoryQueries: Send + Sync {
    async fn find_repository(&self, repository: &RepositoryId)
    -> anyhow::Result<Option<RepositoryInfo>>;

    async fn top_committers(
        &self,
        repository: &RepositoryId,
        range: DateRange,
        pagination: Pagination,
    ) -> anyhow::Result<Vec<AuthorStat>>;

    async fn find_commits(
        &self,
        filter: &CommitFilter,
        pagination: Pagination,
    ) -> anyhow::Result<CommitPage>;
}
