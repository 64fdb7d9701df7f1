//! Statistics generation from the novel library
//!
//! This module provides functionality for extracting and displaying
//! library statistics from the storage layer.

use crate::state::JobState;
use crate::storage::{StorageResult, Store};
use std::collections::HashMap;

/// Library statistics summary
#[derive(Debug, Clone, Default)]
pub struct LibraryStatistics {
    /// Total number of stored novels
    pub novels: u64,

    /// Total number of catalog entries
    pub chapters: u64,

    /// Chapters with stored content
    pub contents: u64,

    /// Count of jobs by state
    pub jobs_by_state: HashMap<JobState, u64>,
}

impl LibraryStatistics {
    /// Chapters whose content is pending or failed
    pub fn pending(&self) -> u64 {
        self.chapters.saturating_sub(self.contents)
    }

    /// Percentage of catalog entries with content
    pub fn coverage(&self) -> f64 {
        if self.chapters == 0 {
            0.0
        } else {
            (self.contents as f64 / self.chapters as f64) * 100.0
        }
    }

    pub fn total_jobs(&self) -> u64 {
        self.jobs_by_state.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
pub fn load_statistics(store: &dyn Store) -> StorageResult<LibraryStatistics> {
    Ok(LibraryStatistics {
        novels: store.count_novels()?,
        chapters: store.count_chapters()?,
        contents: store.count_contents()?,
        jobs_by_state: store.count_jobs_by_state()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LibraryStatistics) {
    println!("=== Library Statistics ===\n");

    println!("Overview:");
    println!("  Novels: {}", stats.novels);
    println!("  Chapters: {}", stats.chapters);
    println!("  Chapters with content: {}", stats.contents);
    println!("  Content pending/failed: {}", stats.pending());
    println!();

    if !stats.jobs_by_state.is_empty() {
        println!("Jobs by State:");
        let total = stats.total_jobs();
        let mut state_counts: Vec<_> = stats.jobs_by_state.iter().collect();
        state_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (state, count) in state_counts {
            let percentage = (*count as f64 / total as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", state, count, percentage);
        }
        println!();
    }

    println!(
        "Content Coverage: {:.1}% ({} / {} chapters)",
        stats.coverage(),
        stats.contents,
        stats.chapters
    );
}
