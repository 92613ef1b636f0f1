//! Audio allocation services
//!
//! [`Allocator`] ties the components together for the request layer:
//! - [`InventorySynchronizer`]: keeps the catalog in step with the pool on disk
//! - [`RotationCounter`]: picks the session's subfolder
//! - [`AudioSelector`]: picks the file for one question

pub mod inventory;
pub mod rotation;
pub mod selector;

pub use inventory::{scan_audio_files, InventorySynchronizer};
pub use rotation::RotationCounter;
pub use selector::AudioSelector;

use std::sync::Arc;

use tracing::info;

use crate::error::AllocError;
use crate::models::{Selection, SubfolderCounterState, SyncReport, UsedAudioLogEntry};
use crate::pool::{PoolLayout, SurveyId};
use crate::session::SessionContext;
use crate::store::AudioStore;

#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn AudioStore>,
    layout: PoolLayout,
    inventory: InventorySynchronizer,
    rotation: RotationCounter,
    selector: AudioSelector,
}

impl Allocator {
    pub fn new(store: Arc<dyn AudioStore>, layout: PoolLayout) -> Self {
        let inventory = InventorySynchronizer::new(Arc::clone(&store));
        let rotation = RotationCounter::new(Arc::clone(&store), layout.clone());
        let selector = AudioSelector::new(Arc::clone(&store), layout.clone(), rotation.clone());
        Self {
            store,
            layout,
            inventory,
            rotation,
            selector,
        }
    }

    pub fn layout(&self) -> &PoolLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<dyn AudioStore> {
        &self.store
    }

    /// Synchronize the catalog with the survey's audio root
    pub async fn sync_inventory(&self, survey: &SurveyId) -> play_common::Result<SyncReport> {
        self.inventory.sync(&self.layout.survey_root(survey)).await
    }

    pub async fn current_subfolder(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
    ) -> Result<String, AllocError> {
        self.rotation.current_subfolder(survey, session).await
    }

    pub async fn select(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
        code: &str,
    ) -> Result<Selection, AllocError> {
        self.selector.select(survey, session, code).await
    }

    /// Finish a session: make sure it took its one counter step
    ///
    /// Returns the survey's counter as it stands afterwards.
    pub async fn complete_session(
        &self,
        survey: &SurveyId,
        session: &mut SessionContext,
    ) -> Result<Option<SubfolderCounterState>, AllocError> {
        if self.rotation.ensure_advanced(survey, session).await?.is_some() {
            info!(
                survey_id = %survey,
                session_id = session.session_id(),
                "Session completed without audio, counter advanced on completion"
            );
        }
        self.rotation.state(survey).await
    }

    pub async fn counter_state(
        &self,
        survey: &SurveyId,
    ) -> Result<Option<SubfolderCounterState>, AllocError> {
        self.rotation.state(survey).await
    }

    pub async fn usage_for_session(
        &self,
        session_id: &str,
    ) -> play_common::Result<Vec<UsedAudioLogEntry>> {
        self.store.usage_for_session(session_id).await
    }
}
