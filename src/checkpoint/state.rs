use super::CheckpointError;
use crate::state::RunTotals;
use crate::url::extract_offset;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Format version written into every checkpoint file
pub const CHECKPOINT_VERSION: u32 = 1;

/// Where an interrupted crawl continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointState {
    /// Listing page to re-enter
    pub resume_url: String,

    /// Offset taken from `resume_url`, informational only
    pub offset: Option<u64>,

    /// Documents at the head of the resume page already handled
    pub resume_index: usize,

    pub totals: RunTotals,

    /// RFC 3339 timestamp of the last save, empty if unknown
    pub updated_at: String,
}

impl fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) if self.resume_index > 0 => {
                write!(f, "offset {} (+{}) @ ", offset, self.resume_index)?
            }
            Some(offset) => write!(f, "offset {} @ ", offset)?,
            None if self.resume_index > 0 => {
                write!(f, "+{} docs into page @ ", self.resume_index)?
            }
            None => {}
        }
        f.write_str(&self.resume_url)
    }
}

#[derive(Serialize)]
struct CheckpointRecord<'a> {
    resume_url: &'a str,
    offset: Option<u64>,
    resume_index: usize,
    total_documents: u64,
    total_files: u64,
    updated_at: String,
    version: u32,
}

/// Loads the checkpoint stored at `path`
///
/// # Returns
///
/// * `Ok(Some(state))` - A checkpoint with a resume URL was found
/// * `Ok(None)` - No file, or the file names no resume URL
/// * `Err(CheckpointError::Corrupt)` - The file exists but is not a JSON object
pub fn load_checkpoint(path: &Path) -> Result<Option<CheckpointState>, CheckpointError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CheckpointError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let corrupt = |reason: String| CheckpointError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let payload: Value = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
    if !payload.is_object() {
        return Err(corrupt("expected a JSON object".to_string()));
    }
    let stored: StoredCheckpoint =
        serde_json::from_value(payload).map_err(|e| corrupt(e.to_string()))?;

    Ok(stored.into_state())
}

/// Checkpoint file as written by any version, with every field optional
///
/// Counters may be numbers or numeric strings; values of the wrong type are
/// treated as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredCheckpoint {
    #[serde(deserialize_with = "lenient_text")]
    resume_url: Option<String>,
    #[serde(deserialize_with = "lenient_integer")]
    offset: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    resume_index: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    total_documents: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    total_files: Option<i64>,
    #[serde(deserialize_with = "lenient_text")]
    updated_at: Option<String>,
}

impl StoredCheckpoint {
    /// Normalises the stored fields; negative counters clamp to zero
    fn into_state(self) -> Option<CheckpointState> {
        let resume_url = self.resume_url.filter(|url| !url.is_empty())?;
        let count = |value: Option<i64>| value.map_or(0, |v| v.max(0) as u64);

        Some(CheckpointState {
            offset: self
                .offset
                .and_then(|offset| u64::try_from(offset).ok())
                .or_else(|| extract_offset(&resume_url)),
            resume_index: count(self.resume_index) as usize,
            totals: RunTotals::new(count(self.total_documents), count(self.total_files)),
            updated_at: self.updated_at.unwrap_or_default(),
            resume_url,
        })
    }
}

fn lenient_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Persists the resume point
///
/// `None` deletes the file, meaning there is nothing left to resume.
/// Otherwise the full state is written to a temporary sibling and renamed
/// over the previous checkpoint.
pub fn save_checkpoint(
    path: &Path,
    resume_url: Option<&str>,
    resume_index: usize,
    totals: &RunTotals,
) -> Result<(), CheckpointError> {
    let write_error = |source| CheckpointError::Write {
        path: path.to_path_buf(),
        source,
    };

    let Some(resume_url) = resume_url else {
        return match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(write_error(e)),
            _ => Ok(()),
        };
    };

    let record = CheckpointRecord {
        resume_url,
        offset: extract_offset(resume_url),
        resume_index,
        total_documents: totals.documents,
        total_files: totals.files,
        updated_at: chrono::Utc::now().to_rfc3339(),
        version: CHECKPOINT_VERSION,
    };
    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| write_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(write_error)?;
    fs::rename(&tmp, path).map_err(write_error)
}
