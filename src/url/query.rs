use crate::{UrlError, UrlResult};
use url::Url;

/// Listing filters the register expects on every index URL
const DEFAULT_FILTERS: &[(&str, &str)] = &[
    ("avdeling", "*"),
    ("ministry", "*"),
    ("kunngjortDato", "*"),
    ("search", ""),
];

/// Query parameter carrying the numeric pagination cursor
const OFFSET_PARAM: &str = "offset";

/// Query parameter carrying the publication year
const YEAR_PARAM: &str = "year";

type Pairs = Vec<(String, String)>;

pub(crate) fn parse(url: &str) -> UrlResult<Url> {
    Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))
}

pub(crate) fn query_pairs(url: &Url) -> Pairs {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn set_query(url: &mut Url, pairs: &Pairs) {
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
}

/// Replaces every key present in `overrides`, keeping the position of its
/// first occurrence in `base`; new keys are appended in override order.
fn update_pairs(base: &mut Pairs, overrides: &[(String, String)]) {
    let mut keys: Vec<&str> = Vec::new();
    for (key, _) in overrides {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }

    for key in keys {
        let values = overrides
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| (key.to_string(), v.clone()));

        match base.iter().position(|(k, _)| k == key) {
            Some(position) => {
                base.retain(|(k, _)| k != key);
                for (i, pair) in values.enumerate() {
                    base.insert(position + i, pair);
                }
            }
            None => base.extend(values),
        }
    }
}

fn set_param(pairs: &mut Pairs, key: &str, value: String) {
    update_pairs(pairs, &[(key.to_string(), value)]);
}

fn add_default_filters(pairs: &mut Pairs) {
    for (key, value) in DEFAULT_FILTERS {
        if !pairs.iter().any(|(k, _)| k == key) {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
}

/// Extracts the numeric pagination offset from a locator
///
/// Returns None when the URL cannot be parsed, carries no `offset`
/// parameter, or the value is not a non-negative integer.
///
/// # Examples
///
/// ```
/// use lovtidend_crawler::url::extract_offset;
///
/// assert_eq!(extract_offset("https://example.com/register?year=1982&offset=40"), Some(40));
/// assert_eq!(extract_offset("https://example.com/register?year=1982"), None);
/// ```
pub fn extract_offset(url: &str) -> Option<u64> {
    let url = Url::parse(url).ok()?;
    let value = url
        .query_pairs()
        .find(|(key, _)| key == OFFSET_PARAM)
        .map(|(_, value)| value.into_owned())?;
    value.trim().parse().ok()
}

/// Returns a copy of `source_url` pointing at `offset`, without fragment
pub fn build_offset_url(source_url: &str, offset: u64) -> UrlResult<String> {
    let mut url = parse(source_url)?;
    let mut pairs = query_pairs(&url);
    set_param(&mut pairs, OFFSET_PARAM, offset.to_string());
    set_query(&mut url, &pairs);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Resolves a pagination link against the current page and carries the
/// current page's filters over to it
///
/// The register's "next" control only holds a partial query string, so the
/// filters of the page it was found on are merged underneath the link's own
/// parameters.
pub fn merge_listing_query(current_url: &str, next_url: &str) -> UrlResult<String> {
    let current = parse(current_url)?;
    let mut target = current
        .join(next_url)
        .map_err(|e| UrlError::Parse(format!("{}: {}", next_url, e)))?;

    let mut merged = query_pairs(&current);
    update_pairs(&mut merged, &query_pairs(&target));
    set_query(&mut target, &merged);
    target.set_fragment(None);

    Ok(target.to_string())
}

/// Drops the fragment from a listing locator
pub fn normalize_listing_url(url: &str) -> UrlResult<String> {
    let mut parsed = parse(url)?;
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// Builds the first listing page for a publication year
pub fn year_url(base_url: &str, year: i32) -> UrlResult<String> {
    let mut url = parse(base_url)?;
    let mut pairs = query_pairs(&url);
    add_default_filters(&mut pairs);
    set_param(&mut pairs, YEAR_PARAM, year.to_string());
    set_query(&mut url, &pairs);
    Ok(url.to_string())
}

/// Builds the initial listing URL from command-line style inputs
///
/// An explicit start URL is returned verbatim. Otherwise the base URL gets
/// the default listing filters and the requested year/offset; with neither a
/// year nor an offset there is no explicit start point.
pub fn make_start_url(
    base_url: &str,
    start_url: Option<&str>,
    offset: Option<u64>,
    year: Option<i32>,
) -> UrlResult<Option<String>> {
    if let Some(start_url) = start_url {
        return Ok(Some(start_url.to_string()));
    }
    if offset.is_none() && year.is_none() {
        return Ok(None);
    }

    let mut url = parse(base_url)?;
    let mut pairs = query_pairs(&url);
    add_default_filters(&mut pairs);
    if let Some(year) = year {
        set_param(&mut pairs, YEAR_PARAM, year.to_string());
    }
    if let Some(offset) = offset {
        set_param(&mut pairs, OFFSET_PARAM, offset.to_string());
    }
    set_query(&mut url, &pairs);
    Ok(Some(url.to_string()))
}

/// Reads the `year` query parameter, falling back to a year in the path
pub fn extract_year_from_url(url: &str) -> Option<i32> {
    let parsed = Url::parse(url).ok()?;
    if let Some((_, value)) = parsed.query_pairs().find(|(key, _)| key == YEAR_PARAM) {
        return value.trim().parse().ok();
    }
    super::year::year_from_fragment(parsed.path())
}
