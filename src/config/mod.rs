//! Configuration module for Novel-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; a missing file section falls back to defaults that
//! match a plain browser-like crawler with a 12-worker pool.
//!
//! # Example
//!
//! ```no_run
//! use novel_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("novel-ripple.toml")).unwrap();
//! println!("Chapter workers: {}", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, SelectorProfile, StorageConfig, UserAgentConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
