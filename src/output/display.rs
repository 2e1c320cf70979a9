use crate::crawler::DocumentListing;
use std::path::{Path, PathBuf};

/// Renders paths relative to `root` where possible, comma separated
pub fn display_paths(files: &[PathBuf], root: &Path) -> String {
    files
        .iter()
        .map(|path| {
            path.strip_prefix(root)
                .unwrap_or(path)
                .display()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Short label for a document in status lines
pub fn describe_document(document: &DocumentListing) -> &str {
    if !document.identifier.is_empty() {
        &document.identifier
    } else if !document.title.is_empty() {
        &document.title
    } else {
        &document.document_url
    }
}

/// "XML file(s)" when every path is an XML file, "file(s)" otherwise
pub fn describe_files(files: &[PathBuf]) -> &'static str {
    let all_xml = files.iter().all(|path| {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
    });
    if all_xml {
        "XML file(s)"
    } else {
        "file(s)"
    }
}
