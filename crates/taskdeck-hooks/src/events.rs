//! Job lifecycle event types.

use serde::{Deserialize, Serialize};

use taskdeck_types::Job;

/// Events emitted by the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// An optimistic job was inserted and the submission request is in flight.
    Submitted { job: Job },
    /// The job service accepted the submission.
    Accepted { job: Job },
    /// The job service reported the work as already satisfied.
    Skipped {
        job_type: String,
        dedup_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        existing_count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The submission request failed.
    SubmissionFailed {
        job_type: String,
        dedup_key: String,
        error: String,
    },
    /// A poll observed the job reaching a terminal status.
    Finished { job: Job },
    /// A poll tick could not fetch jobs of this type.
    PollFailed { job_type: String, error: String },
}

/// Discriminant of [`JobEvent`], used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEventKind {
    Submitted,
    Accepted,
    Skipped,
    SubmissionFailed,
    Finished,
    PollFailed,
}

impl JobEventKind {
    /// Wire name, matching the `type` tag of the serialized event.
    pub fn as_str(self) -> &'static str {
        match self {
            JobEventKind::Submitted => "submitted",
            JobEventKind::Accepted => "accepted",
            JobEventKind::Skipped => "skipped",
            JobEventKind::SubmissionFailed => "submission_failed",
            JobEventKind::Finished => "finished",
            JobEventKind::PollFailed => "poll_failed",
        }
    }
}

impl JobEvent {
    pub fn kind(&self) -> JobEventKind {
        match self {
            JobEvent::Submitted { .. } => JobEventKind::Submitted,
            JobEvent::Accepted { .. } => JobEventKind::Accepted,
            JobEvent::Skipped { .. } => JobEventKind::Skipped,
            JobEvent::SubmissionFailed { .. } => JobEventKind::SubmissionFailed,
            JobEvent::Finished { .. } => JobEventKind::Finished,
            JobEvent::PollFailed { .. } => JobEventKind::PollFailed,
        }
    }

    /// Type and dedup key of the job the event is about, when it names one.
    pub fn subject(&self) -> Option<(&str, &str)> {
        match self {
            JobEvent::Submitted { job } | JobEvent::Accepted { job } | JobEvent::Finished { job } => {
                Some((job.job_type.as_str(), job.dedup_key.as_str()))
            }
            JobEvent::Skipped {
                job_type,
                dedup_key,
                ..
            }
            | JobEvent::SubmissionFailed {
                job_type,
                dedup_key,
                ..
            } => Some((job_type.as_str(), dedup_key.as_str())),
            JobEvent::PollFailed { .. } => None,
        }
    }
}
