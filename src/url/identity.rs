//! Stable identifiers derived from URLs

use sha2::{Digest, Sha256};
use url::Url;

const PAGE_EXTENSIONS: &[&str] = &[".html", ".htm", ".shtml", ".php"];

/// Derives the chapter identifier from a chapter URL
///
/// The identifier is the last non-empty path segment with a page extension
/// removed (`/book/42/1001.html` -> `1001`). URLs without a usable segment
/// fall back to the first 16 hex characters of the URL's SHA-256.
///
/// # Examples
///
/// ```
/// use novel_ripple::url::chapter_id_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/book/42/1001.html").unwrap();
/// assert_eq!(chapter_id_from_url(&url), "1001");
/// ```
pub fn chapter_id_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(strip_page_extension)
        .filter(|s| !s.is_empty());

    match segment {
        Some(segment) => match url.query() {
            // `read.php?id=7` style links share one segment
            Some(query) if !query.is_empty() => format!("{}-{}", segment, short_hash(query)),
            _ => segment.to_string(),
        },
        None => short_hash(url.as_str()),
    }
}

/// Qualifies a chapter identifier with its parent path segment
///
/// Catalogs split into volumes reuse file names (`/vol1/1.html` and
/// `/vol2/1.html`), so the parent segment is prefixed to tell them apart
/// (`vol2-1`). URLs with no parent segment get a short hash of the full URL
/// appended instead.
///
/// # Examples
///
/// ```
/// use novel_ripple::url::qualified_chapter_id;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/book/vol2/1.html").unwrap();
/// assert_eq!(qualified_chapter_id(&url), "vol2-1");
/// ```
pub fn qualified_chapter_id(url: &Url) -> String {
    let id = chapter_id_from_url(url);
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    match segments.len() {
        n if n >= 2 => format!("{}-{}", segments[n - 2], id),
        _ => format!("{}-{}", id, short_hash(url.as_str())),
    }
}

/// Derives a readable slug from a source URL
///
/// Used as the natural key for novels whose title could not be extracted:
/// the host followed by the path segments, joined with `-`.
///
/// # Examples
///
/// ```
/// use novel_ripple::url::slug_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://www.example.com/book/42/").unwrap();
/// assert_eq!(slug_from_url(&url), "www.example.com-book-42");
/// ```
pub fn slug_from_url(url: &Url) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(host) = url.host_str() {
        parts.push(host.to_lowercase());
    }
    if let Some(segments) = url.path_segments() {
        parts.extend(
            segments
                .filter(|s| !s.is_empty())
                .map(|s| strip_page_extension(s).to_string()),
        );
    }
    if parts.is_empty() {
        return short_hash(url.as_str());
    }
    parts.join("-")
}

fn strip_page_extension(segment: &str) -> &str {
    let lower = segment.to_ascii_lowercase();
    for ext in PAGE_EXTENSIONS {
        if lower.ends_with(ext) {
            return &segment[..segment.len() - ext.len()];
        }
    }
    segment
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..16].to_string()
}
