//! Read-only views of allocation state

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::hooks::CounterResponse;
use super::parse_survey_id;
use crate::error::ApiResult;
use crate::models::UsedAudioLogEntry;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub session_id: String,
    pub entries: Vec<UsedAudioLogEntry>,
}

/// GET /api/surveys/:survey_id/counter
pub async fn get_counter(
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<CounterResponse>> {
    let survey = parse_survey_id(&survey_id)?;
    let counter = state.allocator.counter_state(&survey).await?;
    Ok(Json(CounterResponse {
        survey_id: survey.to_string(),
        counter,
    }))
}

/// GET /api/sessions/:session_id/usage
pub async fn get_session_usage(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<UsageResponse>> {
    let entries = state.allocator.usage_for_session(&session_id).await?;
    Ok(Json(UsageResponse { session_id, entries }))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/api/surveys/:survey_id/counter", get(get_counter))
        .route("/api/sessions/:session_id/usage", get(get_session_usage))
}
