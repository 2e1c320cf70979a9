//! Output module for downloaded files and run reporting
//!
//! This module handles:
//! - Mapping file URLs to their place under the output directory
//! - Formatting status lines for documents and written files
//! - Recording per-run statistics and the closing summary

mod display;
mod layout;
pub mod stats;

pub use display::{describe_document, describe_files, display_paths};
pub use layout::{html_fallback_path, partial_path, target_path, FALLBACK_EXTENSION};
pub use stats::{SessionStats, FAILURE_WARNING_THRESHOLD};
