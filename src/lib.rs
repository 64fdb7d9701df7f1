//! Novel-Ripple: a serialized web fiction harvester
//!
//! This crate crawls a novel's table-of-contents page, fetches every chapter
//! through a bounded worker pool, strips site boilerplate from the chapter
//! bodies, and persists catalog and content idempotently in SQLite so that
//! novels can be served later without re-fetching.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Novel-Ripple operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid source URL: {0}")]
    Url(#[from] UrlError),

    #[error("Failed to fetch {url}: {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Failed to parse {url}: {source}")]
    Parse { url: String, source: ParseError },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("Job {0} ended without a report")]
    JobAborted(i64),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid selector in profile '{profile}': {selector}")]
    InvalidSelector { profile: String, selector: String },

    #[error("Invalid boilerplate pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors. Any of these means a job never started.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Failure of a single HTTP GET
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

impl FetchError {
    /// Returns true if re-issuing the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::HttpStatus(code) => *code >= 500 || *code == 429,
        }
    }
}

/// Structural elements missing from a fetched page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no chapter content container found")]
    ContentNotFound,

    #[error("catalog page is empty")]
    CatalogNotFound,
}

/// Result type alias for Novel-Ripple operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlOptions, JobHandle, JobOutcome, JobReport};
pub use state::JobState;
pub use storage::{ChapterKey, SqliteStore, Store};
