//! Allocation data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::QuestionKind;

/// Persisted per-survey subfolder rotation state
///
/// Field names on disk match the counter file format used by existing
/// deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfolderCounterState {
    #[serde(rename = "lastUsedIndex")]
    pub last_used_index: i64,
    #[serde(rename = "totalSubfolders")]
    pub total_subfolders: usize,
    #[serde(rename = "SubfolderTimesUsed")]
    pub usage_counts: Vec<u64>,
}

impl SubfolderCounterState {
    /// Fresh state: nothing used yet
    pub fn new(total_subfolders: usize) -> Self {
        Self {
            last_used_index: -1,
            total_subfolders,
            usage_counts: vec![0; total_subfolders],
        }
    }

    /// Check the structural invariants of a loaded record
    pub fn validate(&self) -> Result<(), String> {
        if self.total_subfolders == 0 {
            return Err("totalSubfolders is 0".to_string());
        }
        if self.usage_counts.len() != self.total_subfolders {
            return Err(format!(
                "SubfolderTimesUsed has {} entries, expected {}",
                self.usage_counts.len(),
                self.total_subfolders
            ));
        }
        Ok(())
    }

    /// Move to the next subfolder and count its use
    ///
    /// Must only be called on a state that passed [`validate`](Self::validate).
    pub fn advance(&mut self) -> usize {
        let total = self.total_subfolders as i64;
        // Normalize first so a hand-edited index cannot overflow
        let next = (self.last_used_index.rem_euclid(total) + 1) % total;
        self.last_used_index = next;
        // next < total == usage_counts.len() after validate()
        let index = next as usize;
        if let Some(count) = self.usage_counts.get_mut(index) {
            *count += 1;
        }
        index
    }

    /// `lastUsedIndex` normalized into `0..totalSubfolders`, if it can be
    pub fn current_index(&self) -> Option<usize> {
        if self.total_subfolders == 0 {
            return None;
        }
        let index = self.last_used_index % self.total_subfolders as i64;
        usize::try_from(index).ok()
    }

    pub fn total_uses(&self) -> u64 {
        self.usage_counts.iter().sum()
    }
}

/// One append-only audit record of a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedAudioLogEntry {
    pub guid: Uuid,
    pub session_id: String,
    pub path: String,
    pub used_at: DateTime<Utc>,
}

impl UsedAudioLogEntry {
    pub fn new(session_id: &str, path: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            session_id: session_id.to_string(),
            path,
            used_at: play_common::time::now(),
        }
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Public URL to embed as the audio source
    pub url: String,
    /// Normalized absolute path of the chosen file
    pub path: String,
    pub subfolder: String,
    pub audio_number: String,
    pub kind: QuestionKind,
    /// The session's selection set was exhausted and cleared by this call
    pub replay_reset: bool,
}

/// Counters from one inventory synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Audio files found on disk
    pub scanned: usize,
    /// Newly added to the catalog
    pub inserted: usize,
    /// Already present in the catalog
    pub already_known: usize,
    /// Catalog writes that failed (scan continued)
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = SubfolderCounterState::new(3);
        assert_eq!(state.last_used_index, -1);
        assert_eq!(state.usage_counts, vec![0, 0, 0]);
        assert!(state.validate().is_ok());
        assert_eq!(state.current_index(), None);
    }

    #[test]
    fn test_advance_cycles() {
        let mut state = SubfolderCounterState::new(2);
        assert_eq!(state.advance(), 0);
        assert_eq!(state.advance(), 1);
        assert_eq!(state.advance(), 0);
        assert_eq!(state.usage_counts, vec![2, 1]);
        assert_eq!(state.total_uses(), 3);
    }

    #[test]
    fn test_advance_from_extreme_indexes() {
        let mut state = SubfolderCounterState::new(3);
        state.last_used_index = i64::MAX;
        // i64::MAX % 3 == 1
        assert_eq!(state.advance(), 2);
        assert_eq!(state.last_used_index, 2);
        assert_eq!(state.usage_counts, vec![0, 0, 1]);

        state.last_used_index = i64::MIN;
        // i64::MIN rem_euclid 3 == 1
        assert_eq!(state.advance(), 2);
        assert_eq!(state.usage_counts, vec![0, 0, 2]);
    }

    #[test]
    fn test_validate_rejects_inconsistent_records() {
        let mut state = SubfolderCounterState::new(2);
        state.usage_counts.push(0);
        assert!(state.validate().is_err());

        assert!(SubfolderCounterState::new(0).validate().is_err());
    }

    #[test]
    fn test_current_index_normalizes_modulo() {
        let state = SubfolderCounterState {
            last_used_index: 5,
            total_subfolders: 2,
            usage_counts: vec![3, 3],
        };
        assert_eq!(state.current_index(), Some(1));
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(SubfolderCounterState::new(2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "lastUsedIndex": -1,
                "totalSubfolders": 2,
                "SubfolderTimesUsed": [0, 0]
            })
        );
    }

    #[test]
    fn test_missing_field_fails_to_decode() {
        let result =
            serde_json::from_str::<SubfolderCounterState>(r#"{"lastUsedIndex": 0, "totalSubfolders": 2}"#);
        assert!(result.is_err());
    }
}
