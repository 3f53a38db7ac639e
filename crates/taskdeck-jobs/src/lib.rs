//! taskdeck-jobs: Background job submission and tracking.
//!
//! Provides:
//! - `JobStore`, the in-memory registry of jobs visible to callers
//! - `JobOrchestrator`, optimistic submission with dedup and a polling loop
//!   that stops once no job is pending
//! - `JobService`, the seam to the remote job service, with an HTTP client

pub mod orchestrator;
pub mod service;
pub mod store;

pub use orchestrator::{JobOrchestrator, PollReport, SubmitOutcome, status_label};
pub use service::{HttpJobService, JobService, SkipNotice, SubmitResponse};
pub use store::{JobStore, MergeOutcome};

#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Job service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected job service response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("A {job_type} job for {dedup_key:?} is already in progress")]
    AlreadyInProgress { job_type: String, dedup_key: String },
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),
    #[error(transparent)]
    Service(#[from] JobServiceError),
}

pub type Result<T> = std::result::Result<T, JobError>;
