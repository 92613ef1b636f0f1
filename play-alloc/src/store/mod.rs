//! Storage interface of the allocator
//!
//! Everything the allocator persists goes through [`AudioStore`]: the catalog
//! of known files, the audit log, and the per-survey subfolder counter. The
//! production implementation is [`SqliteStore`]; [`MemoryStore`] is an
//! in-memory fake with the same semantics for tests.

pub mod counter_file;
pub mod memory;
pub mod sqlite;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use play_common::{Error, Result};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::{SubfolderCounterState, UsedAudioLogEntry};
use crate::pool::SurveyId;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Per-survey mutual exclusion for the counter's read-modify-write
///
/// Serializes writers inside one process only; running several allocator
/// processes against the same pool reintroduces the race.
#[derive(Debug, Default)]
pub struct CounterLocks {
    locks: Mutex<HashMap<SurveyId, Arc<AsyncMutex<()>>>>,
}

impl CounterLocks {
    pub async fn lock(&self, survey: &SurveyId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(survey.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Every path currently in the catalog
    async fn catalog_paths(&self) -> Result<HashSet<String>>;

    async fn catalog_contains(&self, path: &str) -> Result<bool>;

    /// Idempotent insert; `true` when the path was new
    async fn catalog_insert(&self, path: &str) -> Result<bool>;

    /// Append to the audit log
    async fn log_usage(&self, entry: &UsedAudioLogEntry) -> Result<()>;

    async fn usage_for_session(&self, session_id: &str) -> Result<Vec<UsedAudioLogEntry>>;

    /// `Ok(None)` when the survey has no counter yet; [`Error::InvalidData`]
    /// when one exists but cannot be decoded
    async fn load_counter(&self, survey: &SurveyId) -> Result<Option<SubfolderCounterState>>;

    async fn save_counter(&self, survey: &SurveyId, state: &SubfolderCounterState) -> Result<()>;

    fn counter_locks(&self) -> &CounterLocks;

    /// Atomically advance the survey's counter by one subfolder
    ///
    /// Creates the counter with `total_if_new` subfolders when none exists.
    /// Runs under the survey's lock so concurrent sessions each get their own
    /// step and no write is lost.
    async fn advance_counter(
        &self,
        survey: &SurveyId,
        total_if_new: usize,
    ) -> Result<SubfolderCounterState> {
        let _guard = self.counter_locks().lock(survey).await;

        let mut state = self
            .load_counter(survey)
            .await?
            .unwrap_or_else(|| SubfolderCounterState::new(total_if_new));
        state.validate().map_err(Error::InvalidData)?;

        state.advance();
        self.save_counter(survey, &state).await?;

        Ok(state)
    }
}
