//! In-memory [`AudioStore`] for tests
//!
//! Counters are kept as raw JSON text so a test can plant an undecodable
//! record; failures of the audit log can be switched on to exercise the
//! persistence error path.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use play_common::{Error, Result};

use super::{AudioStore, CounterLocks};
use crate::models::{SubfolderCounterState, UsedAudioLogEntry};
use crate::pool::SurveyId;

#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Mutex<BTreeSet<String>>,
    usage: Mutex<Vec<UsedAudioLogEntry>>,
    counters: Mutex<HashMap<SurveyId, String>>,
    locks: CounterLocks,
    fail_usage_writes: AtomicBool,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a counter record verbatim
    pub fn put_raw_counter(&self, survey: &SurveyId, raw: &str) {
        guard(&self.counters).insert(survey.clone(), raw.to_string());
    }

    /// Make every subsequent `log_usage` fail
    pub fn fail_usage_writes(&self, fail: bool) {
        self.fail_usage_writes.store(fail, Ordering::SeqCst);
    }

    pub fn catalog_len(&self) -> usize {
        guard(&self.catalog).len()
    }

    pub fn usage_log(&self) -> Vec<UsedAudioLogEntry> {
        guard(&self.usage).clone()
    }
}

#[async_trait]
impl AudioStore for MemoryStore {
    async fn catalog_paths(&self) -> Result<HashSet<String>> {
        Ok(guard(&self.catalog).iter().cloned().collect())
    }

    async fn catalog_contains(&self, path: &str) -> Result<bool> {
        Ok(guard(&self.catalog).contains(path))
    }

    async fn catalog_insert(&self, path: &str) -> Result<bool> {
        Ok(guard(&self.catalog).insert(path.to_string()))
    }

    async fn log_usage(&self, entry: &UsedAudioLogEntry) -> Result<()> {
        if self.fail_usage_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("audit log unavailable".to_string()));
        }
        guard(&self.usage).push(entry.clone());
        Ok(())
    }

    async fn usage_for_session(&self, session_id: &str) -> Result<Vec<UsedAudioLogEntry>> {
        Ok(guard(&self.usage)
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn load_counter(&self, survey: &SurveyId) -> Result<Option<SubfolderCounterState>> {
        let raw = guard(&self.counters).get(survey).cloned();
        raw.map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| Error::InvalidData(format!("counter for survey {}: {}", survey, e)))
        })
        .transpose()
    }

    async fn save_counter(&self, survey: &SurveyId, state: &SubfolderCounterState) -> Result<()> {
        let raw = serde_json::to_string(state)
            .map_err(|e| Error::Internal(format!("Serialize counter failed: {}", e)))?;
        guard(&self.counters).insert(survey.clone(), raw);
        Ok(())
    }

    fn counter_locks(&self) -> &CounterLocks {
        &self.locks
    }
}
