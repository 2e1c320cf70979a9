//! Resumable checkpoint ledger
//!
//! The checkpoint is a small JSON file naming the listing page to re-enter
//! and how many of its documents were already handled. It is the only state
//! that outlives a run. Every save is a complete snapshot written through a
//! temporary file and renamed into place, so readers never see a torn file.

mod state;

pub use state::{load_checkpoint, save_checkpoint, CheckpointState, CHECKPOINT_VERSION};

use crate::state::RunTotals;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing the checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint file {} contains invalid JSON: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to read checkpoint {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Single point of access to the checkpoint file
///
/// A disabled ledger never loads anything and turns saves into no-ops.
#[derive(Debug, Clone)]
pub struct CheckpointLedger {
    path: PathBuf,
    enabled: bool,
}

impl CheckpointLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
        }
    }

    /// A ledger that neither reads nor writes
    pub fn disabled(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn load(&self) -> Result<Option<CheckpointState>, CheckpointError> {
        if !self.enabled {
            return Ok(None);
        }
        load_checkpoint(&self.path)
    }

    /// Records that processing continues at `resume_url`, skipping the first
    /// `resume_index` documents of that page
    pub fn save(
        &self,
        resume_url: &str,
        resume_index: usize,
        totals: &RunTotals,
    ) -> Result<(), CheckpointError> {
        if !self.enabled {
            return Ok(());
        }
        tracing::trace!("Checkpoint -> {} (+{})", resume_url, resume_index);
        save_checkpoint(&self.path, Some(resume_url), resume_index, totals)
    }

    /// Records that there is nothing left to resume
    pub fn clear(&self) -> Result<(), CheckpointError> {
        if !self.enabled {
            return Ok(());
        }
        tracing::debug!("Removing checkpoint {}", self.path.display());
        save_checkpoint(&self.path, None, 0, &RunTotals::default())
    }
}
