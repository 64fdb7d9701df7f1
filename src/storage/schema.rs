//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Novel-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per distinct source novel, unique by natural key
CREATE TABLE IF NOT EXISTS novels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    novel_key TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    source_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Catalog entries, replaced as a whole on refresh
CREATE TABLE IF NOT EXISTS chapters (
    novel_key TEXT NOT NULL REFERENCES novels(novel_key) ON DELETE CASCADE,
    chapter_id TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    ordinal INTEGER NOT NULL CHECK (ordinal >= 1),
    PRIMARY KEY (novel_key, chapter_id),
    UNIQUE (novel_key, ordinal)
);

-- Cleaned chapter bodies; at most one per chapter
CREATE TABLE IF NOT EXISTS chapter_contents (
    novel_key TEXT NOT NULL,
    chapter_id TEXT NOT NULL,
    content TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (novel_key, chapter_id),
    FOREIGN KEY (novel_key, chapter_id)
        REFERENCES chapters(novel_key, chapter_id) ON DELETE CASCADE
);

-- Track crawl jobs
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL,
    novel_key TEXT,
    state TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    discovered INTEGER NOT NULL DEFAULT 0,
    fetched INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_state ON crawl_jobs(state);
CREATE INDEX IF NOT EXISTS idx_crawl_jobs_novel ON crawl_jobs(novel_key);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
