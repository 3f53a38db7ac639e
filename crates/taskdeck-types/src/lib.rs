use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ──────────────────── Scheduler Types ────────────────────

/// A task registered with the remote scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    /// Task identifier assigned by the scheduler.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Five-field cron expression driving the task.
    pub cron_expression: String,
    /// Last time the task body ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// Next time the scheduler will fire the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    /// Whether the scheduler fires this task at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the task body is executing right now.
    #[serde(default)]
    pub is_running: bool,
}

/// Partial update sent to the scheduler for a single task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
}

/// Control actions accepted by the scheduler endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SchedulerAction {
    Start,
    Stop,
    Refresh,
    Trigger {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

// ──────────────────── Job Types ────────────────────

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted but not started.
    #[serde(alias = "waiting", alias = "delayed", alias = "pending")]
    Queued,
    /// Picked up by a worker.
    Processing,
    /// Running and reporting progress.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Whether no further updates are expected for this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the forward-only lifecycle.
    ///
    /// `Processing` and `Active` share a rank, as do the two terminal states.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing | JobStatus::Active => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of long-running work tracked by the job service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Server-assigned id, or a local temporary id before acceptance.
    pub id: String,
    /// Job type tag (e.g. "keyword-generation").
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    /// Percentage complete, 0-100.
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    /// Correlation key, stable across the optimistic-to-confirmed transition.
    #[serde(default)]
    pub dedup_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "chrono::Utc::now")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job with zero progress.
    pub fn queued(
        id: impl Into<String>,
        job_type: impl Into<String>,
        dedup_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            status: JobStatus::Queued,
            progress: 0,
            dedup_key: dedup_key.into(),
            result: None,
            error: None,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Bring a server record into the shape the store expects.
    ///
    /// Completed jobs report full progress; a missing dedup key is filled
    /// from `fallback_key`.
    pub fn normalized(mut self, fallback_key: &str) -> Self {
        if self.dedup_key.is_empty() {
            self.dedup_key = fallback_key.to_string();
        }
        if self.status == JobStatus::Completed {
            self.progress = 100;
        }
        if self.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self
    }
}

/// Body of a job submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub dedup_key: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Clamp an arbitrary numeric progress value into 0-100.
pub fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(clamp_progress).unwrap_or(0))
}

fn default_true() -> bool {
    true
}
