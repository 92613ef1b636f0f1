//! Error types for play-alloc
//!
//! Two layers:
//! - [`AllocError`]: why one allocation produced no audio. Always recoverable; the
//!   request layer turns it into a help-text banner and omits the audio.
//! - [`ApiError`]: request-level failures returned as HTTP errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Allocation failure taxonomy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocError {
    /// Code does not match `audq<NN><k|x|f|s|m|l>`
    #[error("Invalid code format: {0}. Unable to extract audio number and question kind.")]
    InvalidCode(String),

    /// Audio pool has no subdirectories (or cannot be listed)
    #[error("No subfolders found in audio pool {}", .0.display())]
    NoSubfolders(PathBuf),

    /// Persisted counter state is missing, unreadable or inconsistent
    #[error("Invalid or incomplete subfolder counter data: {0}")]
    CounterCorrupt(String),

    /// Stored index does not map onto the current subfolder listing
    #[error("Last used index {index} does not correspond to a valid subfolder ({available} available)")]
    IndexOutOfRange { index: i64, available: usize },

    /// Active subfolder is not named with two digits
    #[error("Subfolder format is incorrect: {0}. Subfolder must be two digits (e.g. '01', '02', ..., '99').")]
    MalformedSubfolder(String),

    /// Active subfolder contains no audio files
    #[error("No audio files found in subfolder: {subfolder} for session ID {session_id}. Check the subfolder name and audio filenames.")]
    EmptyPool { subfolder: String, session_id: String },

    /// No file named `<AudioNumber>.mp3` in the active subfolder
    #[error("No audio file matching audio number {0} found. Check the subfolder and filenames.")]
    NoMatchingAudio(String),

    /// Absolute path is not under the survey's audio root
    #[error("Could not convert file path to relative URL: {0}")]
    PathResolution(String),

    /// Durable write failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AllocError {
    /// Stable machine-readable identifier
    pub fn code(&self) -> &'static str {
        match self {
            AllocError::InvalidCode(_) => "INVALID_CODE",
            AllocError::NoSubfolders(_) => "NO_SUBFOLDERS",
            AllocError::CounterCorrupt(_) => "COUNTER_CORRUPT",
            AllocError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            AllocError::MalformedSubfolder(_) => "MALFORMED_SUBFOLDER",
            AllocError::EmptyPool { .. } => "EMPTY_POOL",
            AllocError::NoMatchingAudio(_) => "NO_MATCHING_AUDIO",
            AllocError::PathResolution(_) => "PATH_RESOLUTION",
            AllocError::Persistence(_) => "PERSISTENCE",
        }
    }

    /// Message shown to the respondent in place of the audio
    pub fn help_banner(&self) -> String {
        self.to_string()
    }

    /// Append this error as a banner to the question's existing help text
    pub fn append_to_help(&self, help: &str) -> String {
        if help.is_empty() {
            self.help_banner()
        } else {
            format!("{}\n\n{}", help, self.help_banner())
        }
    }
}

/// Map a storage error onto the allocation taxonomy
///
/// Undecodable persisted records are corruption; everything else is a
/// persistence failure.
impl From<play_common::Error> for AllocError {
    fn from(err: play_common::Error) -> Self {
        match err {
            play_common::Error::InvalidData(msg) => AllocError::CounterCorrupt(msg),
            other => AllocError::Persistence(other.to_string()),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Allocation failed outside the render hook (422)
    #[error(transparent)]
    Allocation(#[from] AllocError),

    /// play-common error
    #[error("Common error: {0}")]
    Common(#[from] play_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Allocation(ref err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_banner_appended_after_blank_line() {
        let err = AllocError::NoMatchingAudio("07".to_string());
        let help = err.append_to_help("Listen carefully.");
        assert!(help.starts_with("Listen carefully.\n\n"));
        assert!(help.ends_with("Check the subfolder and filenames."));
    }

    #[test]
    fn test_help_banner_on_empty_help() {
        let err = AllocError::InvalidCode("AUDQ07K".to_string());
        assert_eq!(err.append_to_help(""), err.to_string());
    }

    #[test]
    fn test_invalid_data_maps_to_counter_corrupt() {
        let err: AllocError = play_common::Error::InvalidData("missing field".to_string()).into();
        assert_eq!(err.code(), "COUNTER_CORRUPT");

        let err: AllocError = play_common::Error::Internal("boom".to_string()).into();
        assert_eq!(err.code(), "PERSISTENCE");
    }
}
