use crate::{UrlError, UrlResult};
use url::Url;

/// Parses and validates the URL a crawl job starts from
///
/// Only absolute `http`/`https` URLs with a host are accepted. A failure
/// here means the job is never started.
///
/// # Examples
///
/// ```
/// use novel_ripple::url::parse_source_url;
///
/// let url = parse_source_url(" https://example.com/book/1/ ").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
/// assert!(parse_source_url("ftp://example.com/").is_err());
/// ```
pub fn parse_source_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be dropped:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - hrefs that do not resolve to an HTTP(S) URL
pub fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}
