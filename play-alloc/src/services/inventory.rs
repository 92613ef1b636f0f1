//! Inventory synchronizer
//!
//! Brings the catalog of known audio files up to date with a survey's pool on
//! disk. Only `<root>/<subfolder>/*.mp3` is considered; deeper files and files
//! directly in the root are ignored. Entries for files that were deleted stay
//! in the catalog.
//!
//! Safe to run from several page loads at once: the catalog's uniqueness
//! constraint makes concurrent inserts of the same path harmless.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::SyncReport;
use crate::pool::{normalize_path, AUDIO_EXTENSION};
use crate::store::AudioStore;

#[derive(Clone)]
pub struct InventorySynchronizer {
    store: Arc<dyn AudioStore>,
}

/// Audio files exactly one directory below `root`, in file name order
///
/// Unreadable entries are logged and skipped.
pub fn scan_audio_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                // A missing root is an empty pool, not a warning
                if e.depth() > 0 {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().and_then(|ext| ext.to_str()) == Some(AUDIO_EXTENSION)
        })
        .map(|entry| entry.into_path())
        .collect()
}

impl InventorySynchronizer {
    pub fn new(store: Arc<dyn AudioStore>) -> Self {
        Self { store }
    }

    /// Insert every audio file under `audio_root` that the catalog does not know yet
    ///
    /// A failed insert is counted and the scan goes on; only failing to load
    /// the catalog itself is an error.
    pub async fn sync(&self, audio_root: &Path) -> play_common::Result<SyncReport> {
        let known = self.store.catalog_paths().await?;

        let root = audio_root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || scan_audio_files(&root))
            .await
            .map_err(|e| play_common::Error::Internal(format!("Audio scan task failed: {}", e)))?;

        let mut report = SyncReport {
            scanned: files.len(),
            ..SyncReport::default()
        };

        for file in &files {
            let path = normalize_path(file);
            if known.contains(&path) {
                report.already_known += 1;
                continue;
            }

            match self.store.catalog_insert(&path).await {
                Ok(true) => {
                    debug!(path = %path, "Audio file added to catalog");
                    report.inserted += 1;
                }
                // Another page load inserted it after our catalog snapshot
                Ok(false) => report.already_known += 1,
                Err(e) => {
                    warn!(path = %path, "Failed to add audio file to catalog: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            root = %audio_root.display(),
            scanned = report.scanned,
            inserted = report.inserted,
            failed = report.failed,
            "Audio inventory synchronized"
        );

        Ok(report)
    }
}
