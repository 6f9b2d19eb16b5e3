use axum::{
    Json, extract::State, extract::rejection::JsonRejection, http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::commits_sync::core::intent::WatchIntent;
use crate::modules::commits_sync::use_cases::register_intent::handler::RegisterIntentError;
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

#[derive(Deserialize)]
pub struct WatchRepositoryBody {
    pub repository: String,
    pub since: Option<String>,
}

#[derive(Serialize)]
pub struct WatchIntentResponse {
    pub id: Uuid,
    pub repository: String,
    pub since: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WatchIntent> for WatchIntentResponse {
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

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn error(status: StatusCode, message: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub async fn handle(
    State(state): State<AppState>,
    body: Result<Json<WatchRepositoryBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return error(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
    };
    let since = match parse_optional(body.since.as_deref(), DayEdge::Start) {
        Ok(since) => since,
        Err(e) => return error(StatusCode::UNPROCESSABLE_ENTITY, e),
    };

    match state.register_intent.handle(&body.repository, since).await {
        Ok(intent) => (StatusCode::ACCEPTED, Json(WatchIntentResponse::from(intent))).into_response(),
        Err(e @ RegisterIntentError::InvalidRepository(_)) => {
            error(StatusCode::UNPROCESSABLE_ENTITY, e)
        }
        Err(RegisterIntentError::Bus(e)) => {
            tracing::error!(error = %e, "could not submit watch intent");
            error(StatusCode::SERVICE_UNAVAILABLE, "event bus unavailable")
        }
        Err(RegisterIntentError::Registry(e)) => {
            tracing::error!(error = %e, "could not record watch intent");
            error(StatusCode::INTERNAL_SERVER_ERROR, "intent registry unavailable")
        }
    }
}
