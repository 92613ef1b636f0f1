//! Test fixtures: audio pools on disk and allocator wiring

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use play_alloc::pool::{PoolLayout, SurveyId};
use play_alloc::store::{MemoryStore, SqliteStore};
use play_alloc::Allocator;
use tempfile::TempDir;

pub const PUBLIC_PREFIX: &str = "/upload/surveys";

/// A pool root in a temp directory
///
/// Keep the fixture alive for the duration of the test; dropping it removes
/// the directory.
pub struct PoolFixture {
    pub temp_dir: TempDir,
    pub layout: PoolLayout,
}

impl PoolFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let layout = PoolLayout::new(temp_dir.path().join("surveys"), PUBLIC_PREFIX);
        Self { temp_dir, layout }
    }

    /// Pool with the given subfolders, each holding `01.mp3`..`<files>.mp3`
    pub fn with_survey(survey: &str, subfolders: &[&str], files: usize) -> Self {
        let fixture = Self::new();
        fixture.add_survey(survey, subfolders, files);
        fixture
    }

    pub fn survey_root(&self, survey: &str) -> PathBuf {
        self.layout.survey_root(&survey_id(survey))
    }

    pub fn add_survey(&self, survey: &str, subfolders: &[&str], files: usize) {
        fs::create_dir_all(self.survey_root(survey)).unwrap();
        for subfolder in subfolders {
            self.add_subfolder(survey, subfolder, files);
        }
    }

    pub fn add_subfolder(&self, survey: &str, subfolder: &str, files: usize) {
        let dir = self.survey_root(survey).join(subfolder);
        fs::create_dir_all(&dir).unwrap();
        for n in 1..=files {
            fs::write(dir.join(format!("{:02}.mp3", n)), b"ID3").unwrap();
        }
    }

    pub fn add_file(&self, survey: &str, relative: &str) {
        let path = self.survey_root(survey).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"ID3").unwrap();
    }

    pub fn remove_subfolder(&self, survey: &str, subfolder: &str) {
        fs::remove_dir_all(self.survey_root(survey).join(subfolder)).unwrap();
    }

    pub fn write_counter(&self, survey: &str, raw: &str) {
        fs::write(self.layout.counter_path(&survey_id(survey)), raw).unwrap();
    }

    /// Public URL of `<subfolder>/<file>` in a survey's pool
    pub fn url(&self, survey: &str, subfolder: &str, file: &str) -> String {
        format!("{}/{}/files/{}/{}", PUBLIC_PREFIX, survey, subfolder, file)
    }

    pub fn memory_allocator(&self) -> (Arc<MemoryStore>, Allocator) {
        let store = Arc::new(MemoryStore::new());
        let allocator = Allocator::new(store.clone(), self.layout.clone());
        (store, allocator)
    }

    pub async fn sqlite_store(&self) -> Arc<SqliteStore> {
        let db_path = self.temp_dir.path().join("play.db");
        let pool = play_alloc::db::init_database_pool(&db_path).await.unwrap();
        Arc::new(SqliteStore::new(pool, self.layout.clone()))
    }

    pub async fn sqlite_allocator(&self) -> (Arc<SqliteStore>, Allocator) {
        let store = self.sqlite_store().await;
        let allocator = Allocator::new(store.clone(), self.layout.clone());
        (store, allocator)
    }
}

pub fn survey_id(raw: &str) -> SurveyId {
    SurveyId::parse(raw).unwrap()
}
