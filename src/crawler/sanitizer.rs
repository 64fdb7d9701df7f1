//! Chapter text sanitizer
//!
//! Turns the raw inner markup of a chapter container into clean prose.
//! Each pass is a `&str -> String` function applied in order:
//!
//! 1. Strip markup (comments, script/style blocks, tags) and decode the
//!    handful of entities chapter pages actually use
//! 2. Remove known boilerplate phrases, case-insensitively
//! 3. Collapse every whitespace run into a single newline
//! 4. Trim
//!
//! The pipeline is repeated until the text stops changing, which makes
//! cleaning idempotent even when one pass exposes input for an earlier one
//! (an entity decoding into a tag, a phrase split by markup, ...).

use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Built-in boilerplate patterns, longest forms first
const BOILERPLATE_PATTERNS: &[&str] = &[
    // Site name and mirror domains
    r"(?:https?://)?(?:www\.|m\.)?biq[^\n]{0,12}?ge[^\n]{0,12}?(?:com|net|org|cc)",
    r"笔趣阁",
    // Bookmark prompts
    r"请收藏[^\n]{0,20}?(?:网址|本站)",
    r"请?记住[^\n]{0,30}?网址",
    r"please\s+bookmark(?:\s+(?:this|our)\s+(?:page|site))?",
    r"bookmark\s+(?:this|our)\s+(?:page|site)",
    // Pagination notices
    r"本章未完[^\n]{0,30}?继续阅读",
    r"[(（]未完待续[^)）\n]*[)）]",
    r"本章未完",
    r"继续阅读",
    r"continue\s+reading",
    // Promotional calls to action
    r"【[^】\n]*】",
    r"求(?:月票|推荐票|收藏|订阅)",
    r"手机用户请浏览[^\n]{0,40}?阅读",
    r"(?m)^[ \t\x{3000}]*PS[:：][^\n]*",
    // Report-error notices
    r"点此(?:举报|报错)",
    r"章节(?:错误|报错)",
    r"report\s+(?:an?\s+)?error",
];

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("valid regex")
});

static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(?:p|div|li|dd|dt|tr|h[1-6])\b[^>]*>").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z!][^>]*>").expect("valid regex"));

static SPACE_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&(?:nbsp|emsp|ensp|thinsp|#160|#12288);?").expect("valid regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static BUILTIN_BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BOILERPLATE_PATTERNS
        .iter()
        .map(|p| compile_pattern(p).expect("valid regex"))
        .collect()
});

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Boilerplate cleaner with optional site-specific patterns
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    extra: Vec<Regex>,
}

impl Sanitizer {
    /// Sanitizer using only the built-in boilerplate list
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitizer with extra patterns applied after the built-in list
    pub fn with_patterns(patterns: &[String]) -> Result<Self, ConfigError> {
        let extra = patterns
            .iter()
            .map(|p| compile_pattern(p).map_err(|e| ConfigError::InvalidPattern(format!("{p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { extra })
    }

    /// Cleans raw chapter markup into prose
    ///
    /// Total and deterministic; `clean(clean(x)) == clean(x)`.
    pub fn clean(&self, raw: &str) -> String {
        let mut current = self.pass(raw);
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// One run of the pipeline. Never lengthens its input, so repeating it
    /// reaches a fixpoint.
    fn pass(&self, text: &str) -> String {
        let text = strip_markup(text);
        let text = self.remove_boilerplate(&text);
        let text = WHITESPACE_RE.replace_all(&text, "\n");
        text.trim().to_string()
    }

    fn remove_boilerplate(&self, text: &str) -> String {
        BUILTIN_BOILERPLATE
            .iter()
            .chain(self.extra.iter())
            .fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
    }
}

/// Cleans with the built-in boilerplate list only
pub fn clean(raw: &str) -> String {
    Sanitizer::new().clean(raw)
}

fn strip_markup(text: &str) -> String {
    let text = COMMENT_RE.replace_all(text, "");
    let text = SCRIPT_STYLE_RE.replace_all(&text, "");
    let text = BLOCK_BREAK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    let text = SPACE_ENTITY_RE.replace_all(text, " ");
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
