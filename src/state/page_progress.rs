/// Tracks how far processing got within a single listing page
///
/// The resume index only advances while every document from the start of the
/// page has been handled (the contiguous prefix). The first gap freezes it at
/// the gap's position; later successes on the same page do not move it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProgress {
    len: usize,
    skip: usize,
    resume_index: usize,
    contiguous: bool,
}

impl PageProgress {
    /// Starts tracking a page of `len` documents, of which the first
    /// `resume_index` were handled by an earlier run
    ///
    /// The index is capped at the page length. On an empty page the stored
    /// index is carried over unchanged so it is not lost.
    pub fn new(len: usize, resume_index: usize) -> Self {
        let (skip, resume_index) = if resume_index > 0 && len > 0 {
            let capped = resume_index.min(len);
            (capped, capped)
        } else {
            (0, resume_index)
        };

        Self {
            len,
            skip,
            resume_index,
            contiguous: true,
        }
    }

    /// Returns true if the document at `index` was already handled
    pub fn should_skip(&self, index: usize) -> bool {
        index < self.skip
    }

    /// Number of leading documents skipped on this page
    pub fn skipped(&self) -> usize {
        self.skip
    }

    /// Records a committed document
    ///
    /// Returns true when the resume index advanced, meaning the checkpoint
    /// should be persisted.
    pub fn record_success(&mut self, index: usize) -> bool {
        if self.contiguous {
            self.resume_index = index + 1;
        }
        self.contiguous
    }

    /// Records a document that could not be committed
    ///
    /// Returns true for the first gap on the page, the only one that moves
    /// the resume point.
    pub fn record_gap(&mut self, index: usize) -> bool {
        if !self.contiguous {
            return false;
        }
        self.contiguous = false;
        self.resume_index = index;
        true
    }

    pub fn resume_index(&self) -> usize {
        self.resume_index
    }

    pub fn is_contiguous(&self) -> bool {
        self.contiguous
    }

    /// Returns true if every document on the page was handled without a gap
    pub fn is_complete(&self) -> bool {
        self.contiguous && self.resume_index >= self.len
    }
}
