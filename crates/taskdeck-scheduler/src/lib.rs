//! taskdeck-scheduler: Thin facade over the remote task scheduler.
//!
//! Every call is a pass-through to the scheduler service; nothing is cached,
//! so callers re-`list()` after a mutation to see fresh `lastRun`/`nextRun`.

pub mod api;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use taskdeck_cron::{CronError, RecurrenceSpec};
use taskdeck_types::{ScheduledTask, SchedulerAction, TaskUpdates};

pub use api::{HttpSchedulerService, SchedulerService};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    InvalidCronExpression(#[from] CronError),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Task {0} is already running")]
    TaskAlreadyRunning(String),
    #[error("Task mutation failed: {0}")]
    TaskMutationFailed(String),
    #[error("Listing tasks failed: {0}")]
    ListFailed(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected scheduler response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// A task together with its readable schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task: ScheduledTask,
    /// e.g. "Daily at 02:00 UTC", or the parse error for a malformed expression.
    pub description: String,
    /// Next fire times computed locally; empty when not computable.
    pub upcoming: Vec<DateTime<Utc>>,
}

/// Client-side entry point for scheduler operations.
pub struct SchedulerFacade {
    service: Arc<dyn SchedulerService>,
}

impl SchedulerFacade {
    pub fn new(service: Arc<dyn SchedulerService>) -> Self {
        Self { service }
    }

    pub async fn list(&self) -> Result<Vec<ScheduledTask>> {
        self.service.list_tasks().await
    }

    /// Start or stop the scheduler.
    pub async fn set_running(&self, running: bool) -> Result<()> {
        let action = if running {
            SchedulerAction::Start
        } else {
            SchedulerAction::Stop
        };
        self.service.send_action(&action).await?;
        info!(running, "Scheduler state changed");
        Ok(())
    }

    /// Ask the scheduler to reload its task table.
    pub async fn refresh(&self) -> Result<()> {
        self.service.send_action(&SchedulerAction::Refresh).await
    }

    /// Run a task now. Refused while the task is already running.
    pub async fn trigger(&self, task_id: &str) -> Result<()> {
        let tasks = self.service.list_tasks().await?;
        let task = tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
        if task.is_running {
            warn!(task_id, "Trigger refused, task already running");
            return Err(SchedulerError::TaskAlreadyRunning(task_id.to_string()));
        }
        self.service
            .send_action(&SchedulerAction::Trigger {
                task_id: task_id.to_string(),
            })
            .await?;
        info!(task_id, task = %task.name, "Task triggered");
        Ok(())
    }

    pub async fn set_enabled(&self, task_id: &str, enabled: bool) -> Result<()> {
        let updates = TaskUpdates {
            enabled: Some(enabled),
            cron_expression: None,
        };
        self.service.update_task(task_id, &updates).await?;
        info!(task_id, enabled, "Task toggled");
        Ok(())
    }

    /// Replace a task's cron expression.
    ///
    /// The expression is checked locally first; a malformed one is never sent.
    pub async fn update_cron(&self, task_id: &str, cron_expression: &str) -> Result<()> {
        taskdeck_cron::parse(cron_expression)?;
        let updates = TaskUpdates {
            enabled: None,
            cron_expression: Some(cron_expression.trim().to_string()),
        };
        self.service.update_task(task_id, &updates).await?;
        info!(task_id, cron = cron_expression, "Task schedule updated");
        Ok(())
    }

    /// Generate the cron expression for `spec` and store it on the task.
    pub async fn update_schedule(&self, task_id: &str, spec: &RecurrenceSpec) -> Result<String> {
        let cron = taskdeck_cron::generate(spec);
        self.update_cron(task_id, &cron).await?;
        Ok(cron)
    }

    pub async fn delete(&self, task_id: &str) -> Result<()> {
        self.service.delete_task(task_id).await?;
        info!(task_id, "Task deleted");
        Ok(())
    }

    /// List tasks with a readable description and the next `upcoming` run times.
    pub async fn describe_tasks(&self, upcoming: usize) -> Result<Vec<TaskSummary>> {
        let now = Utc::now();
        let tasks = self.service.list_tasks().await?;
        Ok(tasks
            .into_iter()
            .map(|task| summarize(task, now, upcoming))
            .collect())
    }
}

fn summarize(task: ScheduledTask, now: DateTime<Utc>, count: usize) -> TaskSummary {
    let description = taskdeck_cron::describe(&task.cron_expression)
        .unwrap_or_else(|e| e.to_string());
    let upcoming = if task.enabled {
        taskdeck_cron::upcoming(&task.cron_expression, now, count).unwrap_or_default()
    } else {
        Vec::new()
    };
    TaskSummary {
        task,
        description,
        upcoming,
    }
}
