//! Per-run statistics and the closing summary

use crate::state::RunTotals;

/// Share of failed downloads above which the summary warns
pub const FAILURE_WARNING_THRESHOLD: f64 = 0.1;

/// Counters for the current run only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Documents committed this run
    pub documents: u64,

    /// Files written this run
    pub files: u64,

    /// Documents for which a download was attempted
    pub downloads_attempted: u64,

    /// Attempted downloads that ended in an error
    pub downloads_failed: u64,
}

impl SessionStats {
    pub fn record_saved(&mut self, files: usize) {
        self.documents += 1;
        self.files += files as u64;
    }

    /// Fraction of attempted downloads that failed, None if nothing was attempted
    pub fn failure_rate(&self) -> Option<f64> {
        if self.downloads_attempted == 0 {
            return None;
        }
        Some(self.downloads_failed as f64 / self.downloads_attempted as f64)
    }

    pub fn failure_rate_exceeded(&self) -> bool {
        self.failure_rate()
            .is_some_and(|rate| rate > FAILURE_WARNING_THRESHOLD)
    }

    /// Logs the closing summary of a run
    ///
    /// # Arguments
    ///
    /// * `totals` - Cumulative checkpoint counters, when checkpointing is on
    pub fn log_summary(&self, totals: Option<&RunTotals>) {
        if self.documents > 0 {
            tracing::info!(
                "Finished. Documents processed this run: {}, files saved this run: {}",
                self.documents,
                self.files
            );
        } else {
            tracing::info!("Finished. No new documents were downloaded");
        }

        if let Some(totals) = totals.filter(|t| !t.is_empty()) {
            tracing::info!("Total progress stored in checkpoint: {}", totals);
        }

        if self.failure_rate_exceeded() {
            let percent = self.failure_rate().unwrap_or_default() * 100.0;
            tracing::warn!(
                "{:.2}% of downloads failed this run. Consider retrying or reducing load",
                percent
            );
        }
    }
}
