use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::modules::commit_history::core::aggregation::{CommitFilter, DateRange, Pagination};
use crate::shared::core::primitives::RepositoryId;
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

#[derive(Deserialize)]
pub struct HistoryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub author: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl HistoryParams {
    fn range(&self) -> Result<DateRange, Response> {
        let start = parse_optional(self.start_date.as_deref(), DayEdge::Start).map_err(bad_request)?;
        let end = parse_optional(self.end_date.as_deref(), DayEdge::End).map_err(bad_request)?;
        Ok(DateRange::new(start, end))
    }

    fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(error: impl ToString) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(error: anyhow::Error) -> Response {
    tracing::error!(error = %error, "commit history query failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn repository(owner: String, name: String) -> Result<RepositoryId, Response> {
    RepositoryId::new(owner, name).map_err(bad_request)
}

pub async fn top_committers(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let (repository, range) = match (repository(owner, name), params.range()) {
        (Ok(repository), Ok(range)) => (repository, range),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state
        .queries
        .top_committers(&repository, range, params.pagination())
        .await
    {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn commits(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let (repository, range) = match (repository(owner, name), params.range()) {
        (Ok(repository), Ok(range)) => (repository, range),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    let filter = CommitFilter {
        repository,
        range,
        author: params.author.clone().filter(|a| !a.trim().is_empty()),
    };
    match state.queries.find_commits(&filter, params.pagination()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn repository_info(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    let repository = match repository(owner, name) {
        Ok(repository) => repository,
        Err(response) => return response,
    };
    match state.queries.find_repository(&repository).await {
        Ok(Some(info)) => Json(info).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}
