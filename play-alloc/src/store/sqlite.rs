//! Production store: SQLite for the catalog and audit log, a JSON file in the
//! survey's audio root for the subfolder counter

use std::collections::HashSet;

use async_trait::async_trait;
use play_common::Result;
use sqlx::SqlitePool;

use super::counter_file::{read_counter_file, write_counter_file};
use super::{AudioStore, CounterLocks};
use crate::db;
use crate::models::{SubfolderCounterState, UsedAudioLogEntry};
use crate::pool::{PoolLayout, SurveyId};

pub struct SqliteStore {
    pool: SqlitePool,
    layout: PoolLayout,
    locks: CounterLocks,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, layout: PoolLayout) -> Self {
        Self {
            pool,
            layout,
            locks: CounterLocks::default(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AudioStore for SqliteStore {
    async fn catalog_paths(&self) -> Result<HashSet<String>> {
        db::catalog::load_catalog_paths(&self.pool).await
    }

    async fn catalog_contains(&self, path: &str) -> Result<bool> {
        db::catalog::catalog_contains(&self.pool, path).await
    }

    async fn catalog_insert(&self, path: &str) -> Result<bool> {
        db::catalog::insert_catalog_path(&self.pool, path).await
    }

    async fn log_usage(&self, entry: &UsedAudioLogEntry) -> Result<()> {
        db::usage::insert_usage(&self.pool, entry).await
    }

    async fn usage_for_session(&self, session_id: &str) -> Result<Vec<UsedAudioLogEntry>> {
        db::usage::load_usage_for_session(&self.pool, session_id).await
    }

    async fn load_counter(&self, survey: &SurveyId) -> Result<Option<SubfolderCounterState>> {
        let path = self.layout.counter_path(survey);
        tokio::task::spawn_blocking(move || read_counter_file(&path))
            .await
            .map_err(|e| play_common::Error::Internal(format!("Counter read task failed: {}", e)))?
    }

    async fn save_counter(&self, survey: &SurveyId, state: &SubfolderCounterState) -> Result<()> {
        let path = self.layout.counter_path(survey);
        let state = state.clone();
        tokio::task::spawn_blocking(move || write_counter_file(&path, &state))
            .await
            .map_err(|e| play_common::Error::Internal(format!("Counter write task failed: {}", e)))?
    }

    fn counter_locks(&self) -> &CounterLocks {
        &self.locks
    }
}
