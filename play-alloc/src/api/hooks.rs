//! Survey lifecycle hooks
//!
//! The host calls these while it renders a survey:
//! - page load: synchronize the audio catalog
//! - question render: allocate an audio file for the question's code
//! - survey completion: settle the session's counter step and release the session
//!
//! Allocation failures never fail the render request. The question is returned
//! without audio and the reason is appended to its help text.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::parse_survey_id;
use crate::error::ApiResult;
use crate::models::{SubfolderCounterState, SyncReport};
use crate::session::DEFAULT_SESSION_ID;
use crate::AppState;

/// Body of the question render hook
#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    pub session_id: Option<String>,
    /// Question code, e.g. `audq07k`
    pub code: Option<String>,
    /// Host question type, e.g. `K`
    pub question_type: Option<String>,
    /// Existing help text of the question
    #[serde(default)]
    pub help: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    /// Whether allocation was attempted for this question
    pub applied: bool,
    pub audio_url: Option<String>,
    pub help: String,
    /// Machine-readable allocation error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderResponse {
    fn not_applied(help: String) -> Self {
        Self {
            applied: false,
            audio_url: None,
            help,
            error: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CounterResponse {
    pub survey_id: String,
    pub counter: Option<SubfolderCounterState>,
}

/// POST /api/surveys/:survey_id/page
pub async fn page_loaded(
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<SyncReport>> {
    let survey = parse_survey_id(&survey_id)?;
    let report = state.allocator.sync_inventory(&survey).await?;
    Ok(Json(report))
}

/// POST /api/surveys/:survey_id/questions/render
pub async fn render_question(
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
    Json(request): Json<RenderRequest>,
) -> ApiResult<Json<RenderResponse>> {
    let survey = parse_survey_id(&survey_id)?;

    if let Some(question_type) = &request.question_type {
        if !state.allows_question_type(question_type) {
            debug!(survey_id = %survey, question_type = %question_type, "Question type not handled");
            return Ok(Json(RenderResponse::not_applied(request.help)));
        }
    }

    let code = match request.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => return Ok(Json(RenderResponse::not_applied(request.help))),
    };

    let session_id = request.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
    let mut session = state.sessions.acquire(&survey, session_id).await;

    match state.allocator.select(&survey, &mut session, &code).await {
        Ok(selection) => Ok(Json(RenderResponse {
            applied: true,
            audio_url: Some(selection.url),
            help: request.help,
            error: None,
        })),
        Err(e) => {
            warn!(
                survey_id = %survey,
                session_id = session.session_id(),
                code = %code,
                "Audio omitted from question: {}",
                e
            );
            state.record_error(e.to_string()).await;
            Ok(Json(RenderResponse {
                applied: true,
                audio_url: None,
                help: e.append_to_help(&request.help),
                error: Some(e.code().to_string()),
            }))
        }
    }
}

/// POST /api/surveys/:survey_id/sessions/:session_id/complete
pub async fn complete_survey(
    State(state): State<AppState>,
    Path((survey_id, session_id)): Path<(String, String)>,
) -> ApiResult<Json<CounterResponse>> {
    let survey = parse_survey_id(&survey_id)?;

    let result = {
        let mut session = state.sessions.acquire(&survey, &session_id).await;
        state.allocator.complete_session(&survey, &mut session).await
    };
    // The context goes, the counter-step marker stays for late requests
    state.sessions.finish(&survey, &session_id);
    info!(
        survey_id = %survey,
        session_id = %session_id,
        "Survey session completed"
    );

    let counter = result?;
    Ok(Json(CounterResponse {
        survey_id: survey.to_string(),
        counter,
    }))
}

/// Build lifecycle hook routes
pub fn hook_routes() -> Router<AppState> {
    Router::new()
        .route("/api/surveys/:survey_id/page", post(page_loaded))
        .route("/api/surveys/:survey_id/questions/render", post(render_question))
        .route(
            "/api/surveys/:survey_id/sessions/:session_id/complete",
            post(complete_survey),
        )
}
