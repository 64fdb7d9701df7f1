//! HTML extractor for catalog and chapter pages
//!
//! This module turns fetched markup into:
//! - The novel title and the ordered chapter list of a catalog page
//! - The raw inner markup of a chapter body container
//!
//! Containers are located by probing an ordered list of strategies. Probing
//! stops at the first strategy that yields a usable container, so the result
//! is deterministic for a given profile.

use crate::config::SelectorProfile;
use crate::storage::ChapterRef;
use crate::url::{chapter_id_from_url, qualified_chapter_id, resolve_href, slug_from_url};
use crate::{ConfigError, ParseError};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Title used when a catalog page has no usable heading
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One way of locating a container element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStrategy {
    /// `#name`: element with this id
    Id(String),
    /// `.name`: element carrying this class
    Class(String),
    /// Any other CSS selector
    CssPath(String),
}

impl ContainerStrategy {
    /// Classifies a selector string from a profile
    ///
    /// ```
    /// use novel_ripple::crawler::ContainerStrategy;
    ///
    /// assert_eq!(ContainerStrategy::parse("#list"), ContainerStrategy::Id("list".into()));
    /// assert_eq!(ContainerStrategy::parse(".listmain"), ContainerStrategy::Class("listmain".into()));
    /// assert_eq!(
    ///     ContainerStrategy::parse("div.box_con dl"),
    ///     ContainerStrategy::CssPath("div.box_con dl".into())
    /// );
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('#').filter(|n| is_simple_name(n)) {
            Self::Id(name.to_string())
        } else if let Some(name) = raw.strip_prefix('.').filter(|n| is_simple_name(n)) {
            Self::Class(name.to_string())
        } else {
            Self::CssPath(raw.to_string())
        }
    }

    /// The CSS selector this strategy evaluates
    pub fn css(&self) -> String {
        match self {
            Self::Id(name) => format!("[id=\"{}\"]", name),
            Self::Class(name) => format!("[class~=\"{}\"]", name),
            Self::CssPath(path) => path.clone(),
        }
    }
}

fn is_simple_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// A strategy with its compiled selector
#[derive(Debug, Clone)]
struct Probe {
    strategy: ContainerStrategy,
    selector: Selector,
}

impl Probe {
    fn compile(profile: &str, raw: &str) -> Result<Self, ConfigError> {
        let strategy = ContainerStrategy::parse(raw);
        let selector = Selector::parse(&strategy.css()).map_err(|_| ConfigError::InvalidSelector {
            profile: profile.to_string(),
            selector: raw.to_string(),
        })?;
        Ok(Self { strategy, selector })
    }
}

/// Evaluates probes in order and returns the first accepted container
///
/// Within one strategy, matching elements are tried in document order.
fn probe<'a, T>(
    document: &'a Html,
    probes: &'a [Probe],
    mut accept: impl FnMut(ElementRef<'a>) -> Option<T>,
) -> Option<(T, &'a ContainerStrategy)> {
    probes.iter().find_map(|probe| {
        document
            .select(&probe.selector)
            .find_map(&mut accept)
            .map(|found| (found, &probe.strategy))
    })
}

/// Result of parsing a catalog page
#[derive(Debug, Clone)]
pub struct ExtractedCatalog {
    pub title: String,
    /// Natural key of the novel (title, or URL slug for untitled pages)
    pub novel_key: String,
    /// Kept chapter links, ordinals `1..=n` in page order
    pub chapters: Vec<ChapterRef>,
    /// Strategy that located the chapter list, if any did
    pub matched: Option<ContainerStrategy>,
}

/// Compiled selector profile
#[derive(Debug, Clone)]
pub struct Extractor {
    title: Vec<Selector>,
    catalog: Vec<Probe>,
    content: Vec<Probe>,
}

impl Extractor {
    /// Compiles a selector profile
    pub fn from_profile(profile: &SelectorProfile) -> Result<Self, ConfigError> {
        let title = profile
            .title
            .iter()
            .map(|s| {
                Selector::parse(s).map_err(|_| ConfigError::InvalidSelector {
                    profile: profile.name.clone(),
                    selector: s.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = profile
            .catalog
            .iter()
            .map(|s| Probe::compile(&profile.name, s))
            .collect::<Result<Vec<_>, _>>()?;

        let content = profile
            .content
            .iter()
            .map(|s| Probe::compile(&profile.name, s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title,
            catalog,
            content,
        })
    }

    /// Parses a catalog page into a title and its chapter references
    ///
    /// A missing heading yields [`UNKNOWN_TITLE`]. A page where no strategy
    /// finds a usable link list yields an empty chapter list, not an error;
    /// only an empty body is rejected.
    pub fn extract_catalog(
        &self,
        body: &str,
        base_url: &Url,
    ) -> Result<ExtractedCatalog, ParseError> {
        if body.trim().is_empty() {
            return Err(ParseError::CatalogNotFound);
        }

        let document = Html::parse_document(body);
        let title = self.extract_title(&document);
        let novel_key = novel_key_for(&title, base_url);

        let found = probe(&document, &self.catalog, |container| {
            let chapters = collect_chapters(container, base_url, &novel_key);
            (!chapters.is_empty()).then_some(chapters)
        });

        let (chapters, matched) = match found {
            Some((chapters, strategy)) => (chapters, Some(strategy.clone())),
            None => (Vec::new(), None),
        };

        Ok(ExtractedCatalog {
            title,
            novel_key,
            chapters,
            matched,
        })
    }

    /// Locates the chapter body and returns its inner markup
    pub fn extract_content(&self, body: &str) -> Result<String, ParseError> {
        let document = Html::parse_document(body);

        probe(&document, &self.content, |container| {
            let has_text = container.text().any(|t| !t.trim().is_empty());
            has_text.then(|| container.inner_html())
        })
        .map(|(html, _)| html)
        .ok_or(ParseError::ContentNotFound)
    }

    fn extract_title(&self, document: &Html) -> String {
        self.title
            .iter()
            .find_map(|selector| {
                document
                    .select(selector)
                    .map(|element| collapse_inline(&element.text().collect::<String>()))
                    .find(|s| !s.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }
}

/// Derives a novel's natural key from its title
///
/// Untitled pages fall back to the source URL slug so that different
/// sources never share the sentinel title as a key.
pub fn novel_key_for(title: &str, source_url: &Url) -> String {
    if title == UNKNOWN_TITLE {
        slug_from_url(source_url)
    } else {
        title.to_string()
    }
}

/// Collects chapter links inside one container
///
/// Links without href, with empty text, with an unusable href, or repeating
/// an already kept chapter URL are dropped without consuming an ordinal.
/// Distinct URLs whose identifiers collide are kept under a qualified
/// identifier.
fn collect_chapters(container: ElementRef<'_>, base_url: &Url, novel_key: &str) -> Vec<ChapterRef> {
    let mut seen_urls = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut chapters = Vec::new();

    for link in container.select(&ANCHOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = collapse_inline(&link.text().collect::<String>());
        if title.is_empty() {
            continue;
        }
        let Some(url) = resolve_href(href, base_url) else {
            continue;
        };
        if !seen_urls.insert(url.to_string()) {
            continue;
        }
        let chapter_id = unique_chapter_id(&url, &mut seen_ids);

        chapters.push(ChapterRef {
            novel_key: novel_key.to_string(),
            chapter_id,
            title,
            url: url.to_string(),
            ordinal: chapters.len() as u32 + 1,
        });
    }

    chapters
}

/// Picks the first identifier for `url` not yet in `seen` and records it
fn unique_chapter_id(url: &Url, seen: &mut HashSet<String>) -> String {
    let plain = chapter_id_from_url(url);
    if seen.insert(plain.clone()) {
        return plain;
    }

    let qualified = qualified_chapter_id(url);
    let mut candidate = qualified.clone();
    let mut n = 2;
    while !seen.insert(candidate.clone()) {
        candidate = format!("{}-{}", qualified, n);
        n += 1;
    }
    candidate
}

/// Trims and collapses internal whitespace to single spaces
fn collapse_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
