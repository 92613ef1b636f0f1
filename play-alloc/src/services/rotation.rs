//! Subfolder rotation counter
//!
//! Decides which subfolder of a survey's pool is active for a session. Each
//! session moves the survey's counter forward exactly once, on its first
//! access, so consecutive sessions walk the subfolders in a cycle and usage is
//! spread evenly across them.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::AllocError;
use crate::models::SubfolderCounterState;
use crate::pool::{PoolLayout, SurveyId};
use crate::session::SessionContext;
use crate::store::AudioStore;

#[derive(Clone)]
pub struct RotationCounter {
    store: Arc<dyn AudioStore>,
    layout: PoolLayout,
}

impl RotationCounter {
    pub fn new(store: Arc<dyn AudioStore>, layout: PoolLayout) -> Self {
        Self { store, layout }
    }

    /// Current subfolder listing; empty or unreadable pools are `NoSubfolders`
    fn subfolders(&self, survey: &SurveyId) -> Result<Vec<String>, AllocError> {
        let root = self.layout.survey_root(survey);
        match self.layout.list_subfolders(survey) {
            Ok(subfolders) if !subfolders.is_empty() => Ok(subfolders),
            Ok(_) => {
                error!(survey_id = %survey, "No subfolders in audio pool {}", root.display());
                Err(AllocError::NoSubfolders(root))
            }
            Err(e) => {
                error!(survey_id = %survey, "Unable to read subfolders from {}: {}", root.display(), e);
                Err(AllocError::NoSubfolders(root))
            }
        }
    }

    /// Advance the survey's counter unless this session already did
    ///
    /// Returns the new state when an advance happened.
    pub async fn ensure_advanced(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
    ) -> Result<Option<SubfolderCounterState>, AllocError> {
        if session.counter_advanced() {
            return Ok(None);
        }
        let subfolders = self.subfolders(survey)?;
        self.advance(survey, session, subfolders.len()).await.map(Some)
    }

    async fn advance(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
        total_if_new: usize,
    ) -> Result<SubfolderCounterState, AllocError> {
        let state = self.store.advance_counter(survey, total_if_new).await?;
        session.mark_counter_advanced();

        info!(
            survey_id = %survey,
            session_id = session.session_id(),
            index = state.last_used_index,
            "Subfolder index advanced for session"
        );
        Ok(state)
    }

    /// Name of the subfolder active for this session
    ///
    /// Advances the counter on the session's first call. The stored index is
    /// mapped onto a fresh, sorted listing of the pool.
    pub async fn current_subfolder(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
    ) -> Result<String, AllocError> {
        let subfolders = self.subfolders(survey)?;

        if !session.counter_advanced() {
            self.advance(survey, session, subfolders.len()).await?;
        }

        let state = self
            .store
            .load_counter(survey)
            .await?
            .ok_or_else(|| AllocError::CounterCorrupt(format!("no counter record for survey {}", survey)))?;
        state.validate().map_err(AllocError::CounterCorrupt)?;

        let out_of_range = || AllocError::IndexOutOfRange {
            index: state.last_used_index,
            available: subfolders.len(),
        };
        let index = state.current_index().ok_or_else(out_of_range)?;
        let name = subfolders.get(index).cloned().ok_or_else(out_of_range)?;

        debug!(
            survey_id = %survey,
            session_id = session.session_id(),
            subfolder = %name,
            "Current subfolder determined"
        );
        Ok(name)
    }

    /// Persisted counter, if the survey has one
    pub async fn state(&self, survey: &SurveyId) -> Result<Option<SubfolderCounterState>, AllocError> {
        Ok(self.store.load_counter(survey).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: Arc<MemoryStore>,
        counter: RotationCounter,
        layout: PoolLayout,
        survey: SurveyId,
    }

    fn fixture(subfolders: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let layout = PoolLayout::new(temp.path(), "/upload/surveys");
        let survey = SurveyId::parse("42").unwrap();
        fs::create_dir_all(layout.survey_root(&survey)).unwrap();
        for dir in subfolders {
            fs::create_dir_all(layout.survey_root(&survey).join(dir)).unwrap();
        }
        let store = Arc::new(MemoryStore::new());
        let counter = RotationCounter::new(store.clone(), layout.clone());
        Fixture {
            _temp: temp,
            store,
            counter,
            layout,
            survey,
        }
    }

    #[tokio::test]
    async fn test_first_access_initializes_and_advances_to_first_subfolder() {
        let f = fixture(&["01", "02"]);
        let mut session = SessionContext::new(Some("S1"));

        let name = f.counter.current_subfolder(&f.survey, &mut session).await.unwrap();
        assert_eq!(name, "01");
        assert!(session.counter_advanced());

        let state = f.counter.state(&f.survey).await.unwrap().unwrap();
        assert_eq!(state.last_used_index, 0);
        assert_eq!(state.total_subfolders, 2);
        assert_eq!(state.usage_counts, vec![1, 0]);
    }

    #[tokio::test]
    async fn test_repeated_calls_in_one_session_do_not_advance() {
        let f = fixture(&["01", "02", "03"]);
        let mut session = SessionContext::new(Some("S1"));

        for _ in 0..5 {
            let name = f.counter.current_subfolder(&f.survey, &mut session).await.unwrap();
            assert_eq!(name, "01");
        }
        assert!(f.counter.ensure_advanced(&f.survey, &mut session).await.unwrap().is_none());

        let state = f.counter.state(&f.survey).await.unwrap().unwrap();
        assert_eq!(state.total_uses(), 1);
    }

    #[tokio::test]
    async fn test_rotation_is_a_cycle() {
        let subfolders = ["01", "02", "03"];
        let f = fixture(&subfolders);

        let mut seen = Vec::new();
        for i in 0..=subfolders.len() {
            let mut session = SessionContext::new(Some(&format!("S{}", i)));
            seen.push(f.counter.current_subfolder(&f.survey, &mut session).await.unwrap());
        }
        assert_eq!(seen, vec!["01", "02", "03", "01"]);

        let state = f.counter.state(&f.survey).await.unwrap().unwrap();
        assert_eq!(state.total_uses(), 4);
        assert_eq!(state.usage_counts, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn test_no_subfolders() {
        let f = fixture(&[]);
        let mut session = SessionContext::new(Some("S1"));

        let result = f.counter.current_subfolder(&f.survey, &mut session).await;
        assert!(matches!(result, Err(AllocError::NoSubfolders(_))));
        assert!(!session.counter_advanced());
        assert!(f.counter.state(&f.survey).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_counter() {
        let f = fixture(&["01"]);
        f.store.put_raw_counter(&f.survey, "not json at all");
        let mut session = SessionContext::new(Some("S1"));

        let result = f.counter.current_subfolder(&f.survey, &mut session).await;
        assert!(matches!(result, Err(AllocError::CounterCorrupt(_))));
    }

    #[tokio::test]
    async fn test_index_out_of_range_after_pool_shrank() {
        let f = fixture(&["01", "02", "03"]);
        // Counter written when the pool had three folders, now sitting on the third
        f.store.put_raw_counter(
            &f.survey,
            r#"{"lastUsedIndex":2,"totalSubfolders":3,"SubfolderTimesUsed":[1,1,1]}"#,
        );
        fs::remove_dir(f.layout.survey_root(&f.survey).join("03")).unwrap();

        let mut session = SessionContext::new(Some("S1"));
        session.mark_counter_advanced();
        let result = f.counter.current_subfolder(&f.survey, &mut session).await;
        assert_eq!(
            result,
            Err(AllocError::IndexOutOfRange {
                index: 2,
                available: 2
            })
        );
    }

    #[tokio::test]
    async fn test_negative_index_is_out_of_range() {
        let f = fixture(&["01", "02"]);
        f.store.put_raw_counter(
            &f.survey,
            r#"{"lastUsedIndex":-1,"totalSubfolders":2,"SubfolderTimesUsed":[0,0]}"#,
        );
        let mut session = SessionContext::new(Some("S1"));
        session.mark_counter_advanced();

        let result = f.counter.current_subfolder(&f.survey, &mut session).await;
        assert!(matches!(result, Err(AllocError::IndexOutOfRange { index: -1, .. })));
    }
}
