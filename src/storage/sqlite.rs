//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::state::JobState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{
    ChapterKey, ChapterRef, ChapterView, JobCounts, JobRecord, NewNovel, Novel, NovelSummary,
};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn novel_from_row(row: &Row<'_>) -> rusqlite::Result<Novel> {
    Ok(Novel {
        id: row.get(0)?,
        key: row.get(1)?,
        title: row.get(2)?,
        source_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<ChapterRef> {
    Ok(ChapterRef {
        novel_key: row.get(0)?,
        chapter_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        ordinal: row.get(4)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        source_url: row.get(1)?,
        novel_key: row.get(2)?,
        state: JobState::from_db_string(&row.get::<_, String>(3)?).unwrap_or(JobState::Failed),
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        config_hash: row.get(6)?,
        counts: JobCounts {
            discovered: row.get::<_, i64>(7)? as u64,
            fetched: row.get::<_, i64>(8)? as u64,
            failed: row.get::<_, i64>(9)? as u64,
        },
        error_message: row.get(10)?,
    })
}

/// Maps SQLite constraint failures to a readable storage error
fn constraint_error(e: rusqlite::Error, what: &str) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            StorageError::ConstraintViolation(format!("{}: {}", what, e))
        }
        other => StorageError::Sqlite(other),
    }
}

fn insert_chapters(
    tx: &rusqlite::Transaction<'_>,
    novel_key: &str,
    chapters: &[ChapterRef],
) -> StorageResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO chapters (novel_key, chapter_id, title, url, ordinal)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for chapter in chapters {
        if chapter.novel_key != novel_key {
            return Err(StorageError::ConstraintViolation(format!(
                "chapter {} belongs to '{}', not '{}'",
                chapter.chapter_id, chapter.novel_key, novel_key
            )));
        }
        stmt.execute(params![
            novel_key,
            chapter.chapter_id,
            chapter.title,
            chapter.url,
            chapter.ordinal
        ])
        .map_err(|e| constraint_error(e, &format!("chapter {}", chapter.chapter_id)))?;
    }
    Ok(())
}

const NOVEL_COLUMNS: &str = "id, novel_key, title, source_url, created_at";
const CHAPTER_COLUMNS: &str = "novel_key, chapter_id, title, url, ordinal";
const JOB_COLUMNS: &str = "id, source_url, novel_key, state, started_at, finished_at,
     config_hash, discovered, fetched, failed, error_message";

impl Store for SqliteStore {
    // ===== Novels & Catalog =====

    fn find_novel_by_key(&self, key: &str) -> StorageResult<Option<Novel>> {
        let novel = self
            .conn
            .query_row(
                &format!("SELECT {} FROM novels WHERE novel_key = ?1", NOVEL_COLUMNS),
                params![key],
                novel_from_row,
            )
            .optional()?;
        Ok(novel)
    }

    fn find_novel_by_id(&self, id: i64) -> StorageResult<Option<Novel>> {
        let novel = self
            .conn
            .query_row(
                &format!("SELECT {} FROM novels WHERE id = ?1", NOVEL_COLUMNS),
                params![id],
                novel_from_row,
            )
            .optional()?;
        Ok(novel)
    }

    fn create_novel_with_catalog(
        &mut self,
        novel: &NewNovel,
        chapters: &[ChapterRef],
    ) -> StorageResult<Novel> {
        // IMMEDIATE takes the write lock up front, so the existence check
        // and the insert are one serialization point even across processes.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM novels WHERE novel_key = ?1",
                params![novel.key],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StorageError::DuplicateKey(novel.key.clone()));
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO novels (novel_key, title, source_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![novel.key, novel.title, novel.source_url, now],
        )?;
        let id = tx.last_insert_rowid();

        insert_chapters(&tx, &novel.key, chapters)?;
        tx.commit()?;

        Ok(Novel {
            id,
            key: novel.key.clone(),
            title: novel.title.clone(),
            source_url: novel.source_url.clone(),
            created_at: now,
        })
    }

    fn replace_catalog(&mut self, novel_key: &str, chapters: &[ChapterRef]) -> StorageResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM novels WHERE novel_key = ?1",
                params![novel_key],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StorageError::NovelNotFound(novel_key.to_string()));
        }

        // Content rows go with their chapters via ON DELETE CASCADE
        tx.execute("DELETE FROM chapters WHERE novel_key = ?1", params![novel_key])?;
        insert_chapters(&tx, novel_key, chapters)?;
        tx.commit()?;
        Ok(())
    }

    fn get_catalog(&self, novel_key: &str) -> StorageResult<Vec<ChapterRef>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM chapters WHERE novel_key = ?1 ORDER BY ordinal",
            CHAPTER_COLUMNS
        ))?;

        let chapters = stmt
            .query_map(params![novel_key], chapter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chapters)
    }

    fn chapters_missing_content(&self, novel_key: &str) -> StorageResult<Vec<ChapterRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.novel_key, c.chapter_id, c.title, c.url, c.ordinal
             FROM chapters c
             LEFT JOIN chapter_contents cc
               ON cc.novel_key = c.novel_key AND cc.chapter_id = c.chapter_id
             WHERE c.novel_key = ?1 AND cc.chapter_id IS NULL
             ORDER BY c.ordinal",
        )?;

        let chapters = stmt
            .query_map(params![novel_key], chapter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chapters)
    }

    fn list_novels(&self) -> StorageResult<Vec<NovelSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.id, n.novel_key, n.title, n.source_url, n.created_at,
                    (SELECT COUNT(*) FROM chapters c WHERE c.novel_key = n.novel_key),
                    (SELECT COUNT(*) FROM chapter_contents cc WHERE cc.novel_key = n.novel_key)
             FROM novels n
             ORDER BY n.title, n.id",
        )?;

        let novels = stmt
            .query_map([], |row| {
                Ok(NovelSummary {
                    novel: novel_from_row(row)?,
                    chapter_count: row.get::<_, i64>(5)? as u64,
                    content_count: row.get::<_, i64>(6)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(novels)
    }

    fn delete_novel(&mut self, novel_key: &str) -> StorageResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM novels WHERE novel_key = ?1", params![novel_key])?;
        Ok(removed > 0)
    }

    // ===== Chapter Content =====

    fn upsert_chapter_content(&mut self, items: &[(ChapterKey, String)]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let now = Utc::now().to_rfc3339();
            let mut stmt = tx.prepare(
                "INSERT INTO chapter_contents (novel_key, chapter_id, content, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(novel_key, chapter_id)
                 DO UPDATE SET content = excluded.content, fetched_at = excluded.fetched_at",
            )?;
            for (key, text) in items {
                stmt.execute(params![key.novel_key, key.chapter_id, text, now])
                    .map_err(|e| constraint_error(e, &format!("content for {}", key)))?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    fn get_content(&self, key: &ChapterKey) -> StorageResult<Option<String>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM chapter_contents WHERE novel_key = ?1 AND chapter_id = ?2",
                params![key.novel_key, key.chapter_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    fn get_chapter(&self, key: &ChapterKey) -> StorageResult<Option<ChapterView>> {
        let view = self
            .conn
            .query_row(
                "SELECT n.title, c.title, c.ordinal, cc.content
                 FROM chapter_contents cc
                 JOIN chapters c
                   ON c.novel_key = cc.novel_key AND c.chapter_id = cc.chapter_id
                 JOIN novels n ON n.novel_key = c.novel_key
                 WHERE cc.novel_key = ?1 AND cc.chapter_id = ?2",
                params![key.novel_key, key.chapter_id],
                |row| {
                    Ok(ChapterView {
                        key: key.clone(),
                        novel_title: row.get(0)?,
                        title: row.get(1)?,
                        ordinal: row.get(2)?,
                        text: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(view)
    }

    // ===== Job Tracking =====

    fn create_job(&mut self, source_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_jobs (source_url, state, started_at, config_hash)
             VALUES (?1, ?2, ?3, ?4)",
            params![source_url, JobState::Pending.to_db_string(), now, config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_job_state(
        &mut self,
        job_id: i64,
        state: JobState,
        novel_key: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?1, novel_key = COALESCE(?2, novel_key) WHERE id = ?3",
            params![state.to_db_string(), novel_key, job_id],
        )?;
        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        state: JobState,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_jobs
             SET state = ?1, finished_at = ?2, discovered = ?3, fetched = ?4, failed = ?5,
                 error_message = ?6
             WHERE id = ?7",
            params![
                state.to_db_string(),
                now,
                counts.discovered as i64,
                counts.fetched as i64,
                counts.failed as i64,
                error_message,
                job_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    // ===== Statistics =====

    fn count_novels(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM novels", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_chapters(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chapters", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_contents(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chapter_contents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_jobs_by_state(&self) -> StorageResult<HashMap<JobState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM crawl_jobs GROUP BY state")?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let state_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((state_str, count))
        })?;

        for row in rows {
            let (state_str, count) = row?;
            if let Some(state) = JobState::from_db_string(&state_str) {
                summary.insert(state, count as u64);
            }
        }

        Ok(summary)
    }
}
