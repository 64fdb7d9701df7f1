//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::JobState;
use crate::storage::{
    ChapterKey, ChapterRef, ChapterView, JobCounts, JobRecord, NewNovel, Novel, NovelSummary,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Novel already exists: {0}")]
    DuplicateKey(String),

    #[error("Novel not found: {0}")]
    NovelNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write that touches more than one row is a single atomic batch: it
/// either commits fully or leaves the store untouched.
pub trait Store {
    // ===== Novels & Catalog =====

    /// Looks up a novel by its natural key
    fn find_novel_by_key(&self, key: &str) -> StorageResult<Option<Novel>>;

    /// Looks up a novel by its row id
    fn find_novel_by_id(&self, id: i64) -> StorageResult<Option<Novel>>;

    /// Inserts a novel and its full catalog in one transaction
    ///
    /// The existence check and the insert share one write transaction, so
    /// two racing crawls of the same novel cannot both succeed: the loser
    /// gets `StorageError::DuplicateKey`.
    fn create_novel_with_catalog(
        &mut self,
        novel: &NewNovel,
        chapters: &[ChapterRef],
    ) -> StorageResult<Novel>;

    /// Replaces the whole catalog of an existing novel
    ///
    /// Old chapters and their content are removed; nothing is merged.
    fn replace_catalog(&mut self, novel_key: &str, chapters: &[ChapterRef]) -> StorageResult<()>;

    /// Returns a novel's catalog ordered by ordinal
    fn get_catalog(&self, novel_key: &str) -> StorageResult<Vec<ChapterRef>>;

    /// Returns the catalog entries that have no stored content
    fn chapters_missing_content(&self, novel_key: &str) -> StorageResult<Vec<ChapterRef>>;

    /// Lists every novel with chapter and content counts, ordered by title
    fn list_novels(&self) -> StorageResult<Vec<NovelSummary>>;

    /// Deletes a novel together with its chapters and content
    ///
    /// Returns false if no such novel existed.
    fn delete_novel(&mut self, novel_key: &str) -> StorageResult<bool>;

    // ===== Chapter Content =====

    /// Upserts a batch of chapter bodies in one transaction
    ///
    /// Existing content for a key is replaced. Every key must refer to a
    /// committed catalog row.
    fn upsert_chapter_content(&mut self, items: &[(ChapterKey, String)]) -> StorageResult<usize>;

    /// Gets the stored text of one chapter
    fn get_content(&self, key: &ChapterKey) -> StorageResult<Option<String>>;

    /// Gets a chapter's catalog entry joined with its text
    fn get_chapter(&self, key: &ChapterKey) -> StorageResult<Option<ChapterView>>;

    // ===== Job Tracking =====

    /// Records a new job in `Pending` state and returns its id
    fn create_job(&mut self, source_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Updates a job's state, optionally attaching the novel key
    fn update_job_state(
        &mut self,
        job_id: i64,
        state: JobState,
        novel_key: Option<&str>,
    ) -> StorageResult<()>;

    /// Marks a job terminal with its final counts
    fn finish_job(
        &mut self,
        job_id: i64,
        state: JobState,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a job by id
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    // ===== Statistics =====

    fn count_novels(&self) -> StorageResult<u64>;

    fn count_chapters(&self) -> StorageResult<u64>;

    fn count_contents(&self) -> StorageResult<u64>;

    /// Gets job counts grouped by state
    fn count_jobs_by_state(&self) -> StorageResult<HashMap<JobState, u64>>;
}
