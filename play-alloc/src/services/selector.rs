//! Audio file selector
//!
//! Picks the file for one question: the `<AudioNumber>.mp3` of the session's
//! active subfolder. Files already presented in the session are filtered out
//! first; when every file of the subfolder has been shown the session's set is
//! cleared and a new replay cycle starts.
//!
//! If the filtered candidates hold no match, the unfiltered listing is searched
//! again. A number that was already presented can therefore be presented
//! again, which keeps repeated codes answerable at the cost of the no-repeat
//! rule.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::rotation::RotationCounter;
use crate::code;
use crate::error::AllocError;
use crate::models::{Selection, UsedAudioLogEntry};
use crate::pool::{normalize_path, PoolLayout, SurveyId};
use crate::session::SessionContext;
use crate::store::AudioStore;

#[derive(Clone)]
pub struct AudioSelector {
    store: Arc<dyn AudioStore>,
    layout: PoolLayout,
    rotation: RotationCounter,
}

/// Subfolders are named `00`..`99`
fn is_two_digit_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| b.is_ascii_digit())
}

fn find_by_name<'a>(files: impl IntoIterator<Item = &'a PathBuf>, file_name: &str) -> Option<PathBuf> {
    files
        .into_iter()
        .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(file_name))
        .cloned()
}

impl AudioSelector {
    pub fn new(store: Arc<dyn AudioStore>, layout: PoolLayout, rotation: RotationCounter) -> Self {
        Self {
            store,
            layout,
            rotation,
        }
    }

    /// Select the audio file for `raw_code` and return where it is served from
    pub async fn select(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
        raw_code: &str,
    ) -> Result<Selection, AllocError> {
        let code = code::parse(raw_code).map_err(|e| {
            warn!(survey_id = %survey, session_id = session.session_id(), "{}", e);
            e
        })?;

        let subfolder = self.rotation.current_subfolder(survey, session).await?;
        if !is_two_digit_name(&subfolder) {
            error!(survey_id = %survey, subfolder = %subfolder, "Subfolder name is not two digits");
            return Err(AllocError::MalformedSubfolder(subfolder));
        }

        let all_files = match self.layout.list_audio_files(survey, &subfolder) {
            Ok(files) if !files.is_empty() => files,
            listed => {
                match listed {
                    Err(e) => error!(survey_id = %survey, subfolder = %subfolder, "Unable to list audio files: {}", e),
                    Ok(_) => error!(survey_id = %survey, subfolder = %subfolder, "No audio files in subfolder"),
                }
                return Err(AllocError::EmptyPool {
                    subfolder,
                    session_id: session.session_id().to_string(),
                });
            }
        };

        let mut candidates: Vec<&PathBuf> =
            all_files.iter().filter(|path| !session.is_selected(path)).collect();
        let replay_reset = candidates.is_empty();
        if replay_reset {
            info!(
                survey_id = %survey,
                session_id = session.session_id(),
                subfolder = %subfolder,
                "All audio files presented in this session, starting a new cycle"
            );
            session.reset_selection();
            candidates = all_files.iter().collect();
        }

        let file_name = code.file_name();
        let chosen = match find_by_name(candidates, &file_name) {
            Some(path) => path,
            None => {
                let path = find_by_name(&all_files, &file_name).ok_or_else(|| {
                    error!(
                        survey_id = %survey,
                        subfolder = %subfolder,
                        audio_number = code.audio_number(),
                        "No matching audio file"
                    );
                    AllocError::NoMatchingAudio(code.audio_number().to_string())
                })?;
                debug!(
                    session_id = session.session_id(),
                    file = %path.display(),
                    "Reusing already presented file"
                );
                path
            }
        };

        session.mark_selected(chosen.clone());

        let url = self.layout.to_relative_url(&chosen, Some(survey)).map_err(|e| {
            error!(survey_id = %survey, "{}", e);
            e
        })?;

        let path = normalize_path(&chosen);
        self.record_usage(session.session_id(), &path).await?;

        info!(
            survey_id = %survey,
            session_id = session.session_id(),
            subfolder = %subfolder,
            code = raw_code,
            url = %url,
            "Audio file selected"
        );

        Ok(Selection {
            url,
            path,
            subfolder,
            audio_number: code.audio_number().to_string(),
            kind: code.kind(),
            replay_reset,
        })
    }

    /// Append the selection to the audit log
    ///
    /// The in-memory selection stands even when this fails.
    async fn record_usage(&self, session_id: &str, path: &str) -> Result<(), AllocError> {
        let entry = UsedAudioLogEntry::new(session_id, path.to_string());
        self.store.log_usage(&entry).await.map_err(|e| {
            error!(session_id = session_id, path = path, "Failed to record audio usage: {}", e);
            AllocError::Persistence(e.to_string())
        })
    }
}
