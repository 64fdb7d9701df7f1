/// Job state definitions for tracking crawl progress
///
/// This module defines all states a crawl job can be in and which transitions
/// between them are legal.
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    // ===== Active States =====
    /// Job has been accepted but not started
    Pending,

    /// Catalog page is being fetched, parsed and committed
    FetchingCatalog,

    /// Chapter bodies are being fetched by the worker pool
    FetchingChapters,

    /// Chapter content is being written to the store
    Committing,

    // ===== Terminal States =====
    /// Job finished; chapter failures, if any, are in the report
    Completed,

    /// Catalog could not be fetched/parsed, or the store failed
    Failed,

    /// Job was cancelled externally between phases
    Cancelled,
}

impl JobState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the job is still running
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Any active state may fail or be cancelled, except `Committing`, which
    /// has passed the last cancellation point. A catalog phase that finds an
    /// existing novel or an empty catalog completes directly.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, FetchingCatalog) => true,
            (FetchingCatalog, FetchingChapters) | (FetchingCatalog, Completed) => true,
            (FetchingChapters, Committing) => true,
            (Committing, Completed) => true,
            (Committing, Failed) => true,
            (Committing, Cancelled) => false,
            (from, Failed) | (from, Cancelled) => from.is_active(),
            _ => false,
        }
    }

    /// Converts the job state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingCatalog => "fetching_catalog",
            Self::FetchingChapters => "fetching_chapters",
            Self::Committing => "committing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a job state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching_catalog" => Some(Self::FetchingCatalog),
            "fetching_chapters" => Some(Self::FetchingChapters),
            "committing" => Some(Self::Committing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::FetchingCatalog,
            Self::FetchingChapters,
            Self::Committing,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
