use crate::{KeyError, KeyResult};
use url::Url;

/// Path segment introducing an article title in a wiki URL
const WIKI_PATH: &str = "/wiki/";

/// Search page prefix; `/wiki/Spécial:Recherche/France` names the page `France`
const SEARCH_PREFIX: &str = "spécial:recherche/";

/// Normalizes a raw page reference into its canonical key
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject empty input
/// 2. `http(s)` URLs:
///    - path containing `/wiki/` → the title after the last `/wiki/`
///    - any other path → normalized URL (host lowercased, `www.` removed,
///      dot segments and trailing slash removed, fragment and empty query dropped)
/// 3. Relative `/wiki/Title` references → the title, without any query
/// 4. Other `scheme://` references are rejected
/// 5. Titles: fragment removed, percent-decoded (when taken from a URL),
///    search prefix removed, underscores turned into spaces, whitespace
///    collapsed, lowercased
///
/// # Examples
///
/// ```
/// use wikicrawl::key::normalize_key;
///
/// let key = normalize_key("https://fr.wikipedia.org/wiki/R%C3%A9publique_fran%C3%A7aise").unwrap();
/// assert_eq!(key, "république française");
/// ```
pub fn normalize_key(raw: &str) -> KeyResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(KeyError::Empty);
    }

    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        let url = Url::parse(raw).map_err(|e| KeyError::Parse(e.to_string()))?;
        if let Some(idx) = url.path().rfind(WIKI_PATH) {
            let title = &url.path()[idx + WIKI_PATH.len()..];
            return normalize_encoded_title(title);
        }
        return normalize_url(url);
    }

    if let Some(reference) = raw.strip_prefix(WIKI_PATH) {
        // Same title as the absolute form, which only keeps the path
        let title = reference.split('?').next().unwrap_or_default();
        return normalize_encoded_title(title);
    }

    if let Some((scheme, _)) = raw.split_once("://") {
        return Err(KeyError::InvalidScheme(scheme.to_string()));
    }

    normalize_title(raw)
}

/// Normalizes a title taken from a URL path (still percent-encoded)
fn normalize_encoded_title(encoded: &str) -> KeyResult<String> {
    let without_fragment = encoded.split('#').next().unwrap_or_default();
    let decoded = urlencoding::decode(without_fragment)
        .map_err(|_| KeyError::Encoding(encoded.to_string()))?;

    let title = normalize_title(&decoded)?;
    match title.strip_prefix(SEARCH_PREFIX) {
        Some(rest) if !rest.is_empty() => Ok(rest.to_string()),
        Some(_) => Err(KeyError::Empty),
        None => Ok(title),
    }
}

/// Normalizes a plain title
pub(crate) fn normalize_title(title: &str) -> KeyResult<String> {
    let without_fragment = title.split('#').next().unwrap_or_default();
    let folded = fold(without_fragment);
    if folded.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(folded)
}

/// Underscores to spaces, whitespace collapsed, lowercased
pub(crate) fn fold(s: &str) -> String {
    s.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalizes a non-wiki URL used directly as a key
fn normalize_url(mut url: Url) -> KeyResult<String> {
    if let Some(host) = url.host_str() {
        let mut normalized_host = host.to_lowercase();
        if let Some(stripped) = normalized_host.strip_prefix("www.") {
            normalized_host = stripped.to_string();
        }
        url.set_host(Some(&normalized_host))
            .map_err(|e| KeyError::Parse(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(KeyError::Parse(format!("URL has no host: {}", url)));
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);
    url.set_fragment(None);

    if url.query().map(str::is_empty).unwrap_or(false) {
        url.set_query(None);
    }

    Ok(url.to_string())
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}
