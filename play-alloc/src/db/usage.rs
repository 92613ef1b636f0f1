//! Audit log of selections
//!
//! Append-only. The selector never reads it back; it exists for analysis of
//! which respondent heard which file.

use play_common::time::{from_storage_string, to_storage_string};
use play_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::UsedAudioLogEntry;

/// Append one selection record
pub async fn insert_usage(pool: &SqlitePool, entry: &UsedAudioLogEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO used_audio_files (guid, session_id, audio_url, used_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(entry.guid.to_string())
    .bind(&entry.session_id)
    .bind(&entry.path)
    .bind(to_storage_string(&entry.used_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a session's records, oldest first
pub async fn load_usage_for_session(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<UsedAudioLogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, session_id, audio_url, used_at
        FROM used_audio_files
        WHERE session_id = ?
        ORDER BY used_at, rowid
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let guid_str: String = row.get("guid");
        let guid = Uuid::parse_str(&guid_str)
            .map_err(|e| Error::InvalidData(format!("Bad guid '{}': {}", guid_str, e)))?;
        let used_at_str: String = row.get("used_at");

        entries.push(UsedAudioLogEntry {
            guid,
            session_id: row.get("session_id"),
            path: row.get("audio_url"),
            used_at: from_storage_string(&used_at_str)?,
        });
    }

    Ok(entries)
}
