use std::fmt;

/// Cumulative progress counters persisted with the checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// Documents committed across all runs
    pub documents: u64,

    /// Files written across all runs
    pub files: u64,
}

impl RunTotals {
    pub fn new(documents: u64, files: u64) -> Self {
        Self { documents, files }
    }

    /// Counts one committed document that produced `files` files
    pub fn record_document(&mut self, files: usize) {
        self.documents += 1;
        self.files += files as u64;
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0 && self.files == 0
    }
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} documents, {} files", self.documents, self.files)
    }
}
