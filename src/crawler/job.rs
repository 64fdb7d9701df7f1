//! Crawl job handle and reports
//!
//! A job's terminal outcome never collapses to a pass/fail boolean: partial
//! success carries discovered/fetched/failed counts and the per-chapter
//! failures, so callers can tell "3 of 300 chapters missing" from "catalog
//! could not be fetched".

use crate::state::JobState;
use crate::storage::{ChapterKey, JobCounts};
use crate::{CrawlError, FetchError, ParseError, Result};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-job switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Replace the catalog of an already stored novel and re-fetch everything
    pub refresh: bool,
}

/// Why a single chapter produced no content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChapterError {
    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("content was empty after cleaning")]
    EmptyContent,

    #[error("worker task aborted")]
    Aborted,
}

/// A chapter whose content was not committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFailure {
    pub key: ChapterKey,
    pub url: String,
    pub error: ChapterError,
}

/// Counts and failures of one chapter fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterTally {
    pub discovered: u64,
    pub fetched: u64,
    pub failed: u64,
    /// Failed chapters in catalog order
    pub failures: Vec<ChapterFailure>,
}

impl ChapterTally {
    pub fn counts(&self) -> JobCounts {
        JobCounts {
            discovered: self.discovered,
            fetched: self.fetched,
            failed: self.failed,
        }
    }
}

/// Terminal outcome of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// New novel stored; some chapters may have failed
    Created(ChapterTally),

    /// The novel was already stored; nothing was fetched beyond the catalog
    AlreadyExists { novel_key: String },

    /// An existing novel's catalog was replaced and its content re-fetched
    Refreshed(ChapterTally),

    /// Chapters missing content were fetched again
    Recovered(ChapterTally),

    /// Catalog fetch, catalog parse or a store write failed
    Failed { reason: String },

    /// Cancelled while in `phase`; nothing from that phase was committed
    Cancelled { phase: JobState },
}

impl JobOutcome {
    /// State the job row ends in
    pub fn final_state(&self) -> JobState {
        match self {
            Self::Failed { .. } => JobState::Failed,
            Self::Cancelled { .. } => JobState::Cancelled,
            _ => JobState::Completed,
        }
    }

    pub fn tally(&self) -> Option<&ChapterTally> {
        match self {
            Self::Created(tally) | Self::Refreshed(tally) | Self::Recovered(tally) => Some(tally),
            _ => None,
        }
    }

    pub fn counts(&self) -> JobCounts {
        self.tally().map(ChapterTally::counts).unwrap_or_default()
    }

    /// True unless the job failed or was cancelled
    pub fn is_success(&self) -> bool {
        self.final_state() == JobState::Completed
    }
}

/// Structured result of one job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: i64,
    pub source_url: String,
    /// Known once the catalog was parsed
    pub novel_key: Option<String>,
    pub outcome: JobOutcome,
}

/// Handle to a job running in the background
///
/// Dropping the handle does not stop the job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: i64,
    state: watch::Receiver<JobState>,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobReport>>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: i64,
        state: watch::Receiver<JobState>,
        cancel: CancellationToken,
        task: JoinHandle<Result<JobReport>>,
    ) -> Self {
        Self {
            job_id,
            state,
            cancel,
            task,
        }
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Current state of the job
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.clone()
    }

    /// Requests cancellation
    ///
    /// Honored before the catalog commit and before the content commit.
    /// In-flight fetches finish and their results are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the job's report
    pub async fn wait(self) -> Result<JobReport> {
        let job_id = self.job_id;
        self.task.await.map_err(|e| {
            tracing::error!("Job {} task aborted: {}", job_id, e);
            CrawlError::JobAborted(job_id)
        })?
    }
}
