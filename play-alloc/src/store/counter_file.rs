//! Counter record file
//!
//! One JSON document per survey in the survey's audio root. Writes go to a
//! sibling temp file first and are renamed into place, so a reader never sees a
//! half-written record.

use std::io;
use std::path::Path;

use play_common::{Error, Result};

use crate::models::SubfolderCounterState;

/// Read the counter record; `Ok(None)` if the file does not exist
pub fn read_counter_file(path: &Path) -> Result<Option<SubfolderCounterState>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::InvalidData(format!("{}: {}", path.display(), e)))
}

/// Replace the counter record
pub fn write_counter_file(path: &Path, state: &SubfolderCounterState) -> Result<()> {
    let json = serde_json::to_string(state)
        .map_err(|e| Error::Internal(format!("Serialize counter failed: {}", e)))?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
