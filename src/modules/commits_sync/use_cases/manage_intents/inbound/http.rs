use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::modules::commits_sync::core::intent::IntentChange;
use crate::modules::commits_sync::use_cases::manage_intents::handler::ManageIntentsError;
use crate::modules::commits_sync::use_cases::register_intent::inbound::http::{
    WatchIntentResponse, error,
};
use crate::shared::core::timestamps::{DayEdge, parse_optional};
use crate::shell::state::AppState;

#[derive(Deserialize)]
pub struct ListParams {
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateIntentBody {
    pub since: Option<String>,
    pub is_active: Option<bool>,
}

fn failure(e: ManageIntentsError) -> Response {
    match e {
        ManageIntentsError::NotFound(_) => error(StatusCode::NOT_FOUND, e),
        ManageIntentsError::Registry(e) => {
            tracing::error!(error = %e, "intent registry call failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "intent registry unavailable")
        }
        ManageIntentsError::Bus(e) => {
            tracing::error!(error = %e, "could not resubmit watch intent");
            error(StatusCode::SERVICE_UNAVAILABLE, "event bus unavailable")
        }
    }
}

fn intent_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, Response> {
    path.map(|Path(id)| id)
        .map_err(|rejection| error(StatusCode::BAD_REQUEST, rejection.body_text()))
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match state.intents.list(params.is_active).await {
        Ok(intents) => Json(
            intents
                .into_iter()
                .map(WatchIntentResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => failure(e),
    }
}

pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let id = match intent_id(path) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.intents.get(id).await {
        Ok(intent) => Json(WatchIntentResponse::from(intent)).into_response(),
        Err(e) => failure(e),
    }
}

pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateIntentBody>, JsonRejection>,
) -> Response {
    let id = match intent_id(path) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return error(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
    };
    let since = match parse_optional(body.since.as_deref(), DayEdge::Start) {
        Ok(since) => since,
        Err(e) => return error(StatusCode::UNPROCESSABLE_ENTITY, e),
    };
    let change = IntentChange {
        since,
        is_active: body.is_active,
    };
    match state.intents.update(id, change).await {
        Ok(intent) => Json(WatchIntentResponse::from(intent)).into_response(),
        Err(e) => failure(e),
    }
}
