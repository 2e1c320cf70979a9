//! State module for tracking crawl progress
//!
//! Progress is modelled as explicit values owned by the coordinator and
//! handed to the checkpoint ledger, never as process-wide globals.
//!
//! # Components
//!
//! - `PageProgress`: the contiguous-prefix resume index within one listing page
//! - `RunTotals`: cumulative document and file counters stored in the checkpoint

mod page_progress;
mod totals;

// Re-export main types
pub use page_progress::PageProgress;
pub use totals::RunTotals;
