//! State module for tracking crawl job progress
//!
//! Every crawl job walks a small state machine from `Pending` to one of the
//! terminal states. The coordinator persists each transition on the job row.

mod job_state;

pub use job_state::JobState;
