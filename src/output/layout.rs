//! On-disk layout of downloaded files
//!
//! Files land under `<output root>/<year>/<url path>`, where a leading `xml/`
//! path segment is dropped and the year comes from the URL or the file name.

use crate::url::{guess_year, parse, year_from_fragment};
use crate::{UrlError, UrlResult};
use std::path::{Path, PathBuf};

/// Extension used for raw-page captures that stand in for a structured file
pub const FALLBACK_EXTENSION: &str = "html";

/// Maps a file URL to its destination under `output_root`
///
/// # Arguments
///
/// * `output_root` - Root directory for downloaded files
/// * `file_url` - Absolute URL of the structured file
///
/// # Returns
///
/// * `Ok(PathBuf)` - Destination path inside `output_root`
/// * `Err(UrlError)` - The URL cannot be parsed or escapes the output root
///
/// # Example
///
/// ```
/// use lovtidend_crawler::output::target_path;
/// use std::path::Path;
///
/// let path = target_path(Path::new("data/xml"), "https://example.com/xml/LTI/sf-19821209-1673.xml").unwrap();
/// assert_eq!(path, Path::new("data/xml/1982/LTI/sf-19821209-1673.xml"));
/// ```
pub fn target_path(output_root: &Path, file_url: &str) -> UrlResult<PathBuf> {
    let url = parse(file_url)?;

    let mut segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.first() == Some(&"xml") {
        segments.remove(0);
    }

    if segments.is_empty() || segments.iter().any(|s| *s == ".." || *s == ".") {
        return Err(UrlError::OutsideOutput(file_url.to_string()));
    }

    let file_name = segments.last().copied().unwrap_or_default();
    let year = guess_year(file_url).or_else(|| year_from_fragment(file_name));

    let mut target = output_root.to_path_buf();
    if let Some(year) = year {
        let year = year.to_string();
        if segments.first() != Some(&year.as_str()) {
            target.push(year);
        }
    }
    for segment in segments {
        target.push(segment);
    }

    if !target.starts_with(output_root) {
        return Err(UrlError::OutsideOutput(file_url.to_string()));
    }
    Ok(target)
}

/// Destination of the raw-page capture that replaces `destination`
pub fn html_fallback_path(destination: &Path) -> PathBuf {
    destination.with_extension(FALLBACK_EXTENSION)
}

/// Temporary sibling a download streams into before being renamed
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
