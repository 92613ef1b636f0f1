//! Catalog store operations
//!
//! One row per known audio file path. Rows are never updated or deleted; a
//! file removed from disk keeps its row.

use play_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Load every known path
pub async fn load_catalog_paths(pool: &SqlitePool) -> Result<HashSet<String>> {
    let paths: Vec<String> = sqlx::query_scalar("SELECT audio_url FROM audio_uploads")
        .fetch_all(pool)
        .await?;
    Ok(paths.into_iter().collect())
}

pub async fn catalog_contains(pool: &SqlitePool, path: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM audio_uploads WHERE audio_url = ?)")
            .bind(path)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Insert a path unless already present
///
/// Returns `true` when this call added the row. A concurrent insert of the same
/// path resolves through the UNIQUE constraint and reports `false`.
pub async fn insert_catalog_path(pool: &SqlitePool, path: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO audio_uploads (guid, audio_url, created_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(audio_url) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(path)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Count catalog rows
pub async fn count_catalog(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_uploads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
