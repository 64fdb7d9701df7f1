//! Crawler module: the crawl-and-normalize pipeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a fixed browser identity and per-request timeout
//! - Catalog and chapter body extraction by ordered container probing
//! - Boilerplate sanitizing of chapter text
//! - Job coordination over a bounded worker pool

mod coordinator;
mod extractor;
mod fetcher;
mod job;
mod sanitizer;

pub use coordinator::Coordinator;
pub use extractor::{novel_key_for, ContainerStrategy, ExtractedCatalog, Extractor, UNKNOWN_TITLE};
pub use fetcher::{build_http_client, fetch_url, Fetcher};
pub use job::{
    ChapterError, ChapterFailure, ChapterTally, CrawlOptions, JobHandle, JobOutcome, JobReport,
};
pub use sanitizer::{clean, Sanitizer};
