//! Storage module for persisting novels, catalogs and chapter content
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Novel and catalog persistence with natural-key uniqueness
//! - Chapter content upserts
//! - Crawl job tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use crate::state::JobState;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Initializes or opens a store database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Finds a novel by natural key, or by row id when given a number
///
/// The natural key wins: a novel titled `2046` is found by that title even
/// when another novel has row id 2046. Row ids only resolve numeric strings
/// that match no key.
pub fn lookup_novel(store: &dyn Store, key_or_id: &str) -> StorageResult<Option<Novel>> {
    if let Some(novel) = store.find_novel_by_key(key_or_id)? {
        return Ok(Some(novel));
    }
    match key_or_id.parse::<i64>() {
        Ok(id) => store.find_novel_by_id(id),
        Err(_) => Ok(None),
    }
}

/// A persisted novel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Novel {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub source_url: String,
    pub created_at: String,
}

/// A novel about to be inserted
#[derive(Debug, Clone)]
pub struct NewNovel {
    pub key: String,
    pub title: String,
    pub source_url: String,
}

/// A catalog entry discovered on the table-of-contents page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub novel_key: String,
    pub chapter_id: String,
    pub title: String,
    pub url: String,
    /// 1-based position in the catalog
    pub ordinal: u32,
}

impl ChapterRef {
    pub fn key(&self) -> ChapterKey {
        ChapterKey::new(&self.novel_key, &self.chapter_id)
    }
}

/// Identity of one chapter: `novel_key/chapter_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterKey {
    pub novel_key: String,
    pub chapter_id: String,
}

impl ChapterKey {
    pub fn new(novel_key: &str, chapter_id: &str) -> Self {
        Self {
            novel_key: novel_key.to_string(),
            chapter_id: chapter_id.to_string(),
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.novel_key, self.chapter_id)
    }
}

impl FromStr for ChapterKey {
    type Err = String;

    /// Splits at the last `/`; chapter ids never contain one
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('/') {
            Some((novel, chapter)) if !novel.is_empty() && !chapter.is_empty() => {
                Ok(Self::new(novel, chapter))
            }
            _ => Err(format!("expected NOVEL/CHAPTER, got '{}'", s)),
        }
    }
}

/// A chapter's catalog entry joined with its text
#[derive(Debug, Clone)]
pub struct ChapterView {
    pub key: ChapterKey,
    pub novel_title: String,
    pub title: String,
    pub ordinal: u32,
    pub text: String,
}

/// A novel with catalog and content counts
#[derive(Debug, Clone)]
pub struct NovelSummary {
    pub novel: Novel,
    pub chapter_count: u64,
    pub content_count: u64,
}

impl NovelSummary {
    /// Chapters whose content is still pending or failed
    pub fn pending_count(&self) -> u64 {
        self.chapter_count.saturating_sub(self.content_count)
    }
}

/// Per-job chapter counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub discovered: u64,
    pub fetched: u64,
    pub failed: u64,
}

/// Represents a crawl job row
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub source_url: String,
    pub novel_key: Option<String>,
    pub state: JobState,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub counts: JobCounts,
    pub error_message: Option<String>,
}
