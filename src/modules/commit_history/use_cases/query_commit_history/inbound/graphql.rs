use async_graphql::{Context, Object, Result as GqlResult, SimpleObject};
use chrono::{DateTime, Utc};

use crate::modules::commit_history::core::aggregation::{
    AuthorStat, CommitFilter, CommitPage, DateRange, Pagination,
};
use crate::modules::commits_sync::core::commit::{CommitRecord, RepositoryInfo};
use crate::shared::core::primitives::RepositoryId;
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

#[derive(SimpleObject, Clone)]
pub struct GqlAuthorStat {
    pub author: String,
    pub commit_count: u64,
}

impl From<AuthorStat> for GqlAuthorStat {
    fn from(v: AuthorStat) -> Self {
        Self {
            author: v.author,
            commit_count: v.commit_count,
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct GqlCommit {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub author_username: String,
    pub message: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub repository: String,
}

impl From<CommitRecord> for GqlCommit {
    fn from(v: CommitRecord) -> Self {
        Self {
            hash: v.hash,
            author_name: v.author.name,
            author_email: v.author.email,
            author_username: v.author.username,
            message: v.message,
            url: v.url,
            created_at: v.created_at,
            repository: v.repository.to_string(),
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct GqlCommitPage {
    pub commits: Vec<GqlCommit>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

impl From<CommitPage> for GqlCommitPage {
    fn from(v: CommitPage) -> Self {
        Self {
            commits: v.commits.into_iter().map(Into::into).collect(),
            total_count: v.total_count,
            page: v.page,
            per_page: v.per_page,
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct GqlRepository {
    pub id: i64,
    pub full_name: String,
    pub watchers: i32,
    pub star_gazers: i32,
    pub forks: i32,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RepositoryInfo> for GqlRepository {
    fn from(v: RepositoryInfo) -> Self {
        Self {
            id: v.id,
            full_name: v.full_name,
            watchers: v.watchers,
            star_gazers: v.star_gazers,
            forks: v.forks,
            language: v.language,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

fn range(start_date: Option<String>, end_date: Option<String>) -> GqlResult<DateRange> {
    Ok(DateRange::new(
        parse_optional(start_date.as_deref(), DayEdge::Start)?,
        parse_optional(end_date.as_deref(), DayEdge::End)?,
    ))
}

fn pagination(page: Option<i32>, per_page: Option<i32>) -> Pagination {
    let non_negative = |v: i32| v.max(0) as u32;
    Pagination::new(page.map(non_negative), per_page.map(non_negative))
}

#[derive(Default)]
pub struct CommitHistoryQuery;

#[Object]
impl CommitHistoryQuery {
    async fn repository(
        &self,
        context: &Context<'_>,
        repository: String,
    ) -> GqlResult<Option<GqlRepository>> {
        let state = context.data_unchecked::<AppState>();
        let repository = RepositoryId::parse(&repository)?;
        let info = state.queries.find_repository(&repository).await?;
        Ok(info.map(Into::into))
    }

    async fn top_committers(
        &self,
        context: &Context<'_>,
        repository: String,
        start_date: Option<String>,
        end_date: Option<String>,
        page: Option<i32>,
        per_page: Option<i32>,
    ) -> GqlResult<Vec<GqlAuthorStat>> {
        let state = context.data_unchecked::<AppState>();
        let repository = RepositoryId::parse(&repository)?;
        let stats = state
            .queries
            .top_committers(
                &repository,
                range(start_date, end_date)?,
                pagination(page, per_page),
            )
            .await?;
        Ok(stats.into_iter().map(Into::into).collect())
    }

    async fn commits(
        &self,
        context: &Context<'_>,
        repository: String,
        start_date: Option<String>,
        end_date: Option<String>,
        author: Option<String>,
        page: Option<i32>,
        per_page: Option<i32>,
    ) -> GqlResult<GqlCommitPage> {
        let state = context.data_unchecked::<AppState>();
        let filter = CommitFilter {
            repository: RepositoryId::parse(&repository)?,
            range: range(start_date, end_date)?,
            author: author.filter(|a| !a.trim().is_empty()),
        };
        let page = state
            .queries
            .find_commits(&filter, pagination(page, per_page))
            .await?;
        Ok(page.into())
    }
}
