//! HTTP API handlers for play-alloc
//!
//! Hooks called by the survey-rendering host plus read-only audit endpoints.

pub mod audit;
pub mod health;
pub mod hooks;

pub use audit::audit_routes;
pub use health::health_routes;
pub use hooks::hook_routes;

use crate::error::{ApiError, ApiResult};
use crate::pool::SurveyId;

/// Validate a survey id taken from the request path
pub(crate) fn parse_survey_id(raw: &str) -> ApiResult<SurveyId> {
    SurveyId::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid survey id: {:?}", raw)))
}
