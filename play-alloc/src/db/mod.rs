//! Database access for play-alloc
//!
//! Queries against the catalog store (`audio_uploads`) and the audit log
//! (`used_audio_files`). The schema itself lives in `play_common::db::init`.

pub mod catalog;
pub mod usage;

use play_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the shared database and apply the schema
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    play_common::db::init_database(db_path).await
}
