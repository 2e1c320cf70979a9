use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// A `19xx`/`20xx` digit run, also inside longer numbers such as `19821209`
static YEAR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(19|20)[0-9]{2}").ok());

/// Finds the first publication year in a string
pub fn year_from_fragment(fragment: &str) -> Option<i32> {
    YEAR_PATTERN
        .as_ref()?
        .find(fragment)
        .and_then(|year| year.as_str().parse().ok())
}

/// Guesses the publication year a URL refers to
///
/// Query values are checked first, in order, then the path.
pub fn guess_year(url: &str) -> Option<i32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find_map(|(_, value)| year_from_fragment(&value))
        .or_else(|| year_from_fragment(parsed.path()))
}

/// Returns the "show the whole document" variant of a detail page URL
pub fn full_document_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with('*') {
        trimmed.to_string()
    } else {
        format!("{}/*", trimmed)
    }
}

/// Returns true if the URL already asks for the whole document
pub fn is_full_document_url(url: &str) -> bool {
    url.trim_end().ends_with("/*")
}
