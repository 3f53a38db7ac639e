//! Scheduler service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use taskdeck_types::{ScheduledTask, SchedulerAction, TaskUpdates};

use crate::SchedulerError;

/// Remote task scheduler surface.
#[async_trait]
pub trait SchedulerService: Send + Sync {
    /// `GET tasks`.
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, SchedulerError>;

    /// `POST scheduler-action`.
    async fn send_action(&self, action: &SchedulerAction) -> Result<(), SchedulerError>;

    /// `PUT task {taskId, updates}`.
    async fn update_task(&self, task_id: &str, updates: &TaskUpdates)
    -> Result<(), SchedulerError>;

    /// `DELETE task {taskId}`.
    async fn delete_task(&self, task_id: &str) -> Result<(), SchedulerError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskListEnvelope {
    Wrapped { tasks: Vec<ScheduledTask> },
    Bare(Vec<ScheduledTask>),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// HTTP client for the scheduler service.
pub struct HttpSchedulerService {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpSchedulerService {
    /// Create a client rooted at `base_url` (e.g. "http://host/api").
    pub fn new(base_url: &str, timeout: Duration, auth_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a mutating request, mapping any non-2xx answer to `TaskMutationFailed`.
    async fn mutate(&self, request: RequestBuilder) -> Result<(), SchedulerError> {
        let resp = self.authorize(request).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(SchedulerError::TaskMutationFailed(failure_message(resp).await))
    }
}

#[async_trait]
impl SchedulerService for HttpSchedulerService {
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, SchedulerError> {
        let resp = self
            .authorize(self.client.get(format!("{}/tasks", self.base_url)))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SchedulerError::ListFailed(failure_message(resp).await));
        }
        let envelope: TaskListEnvelope = resp
            .json()
            .await
            .map_err(|e| SchedulerError::Decode(format!("task list: {e}")))?;
        Ok(match envelope {
            TaskListEnvelope::Wrapped { tasks } | TaskListEnvelope::Bare(tasks) => tasks,
        })
    }

    async fn send_action(&self, action: &SchedulerAction) -> Result<(), SchedulerError> {
        self.mutate(
            self.client
                .post(format!("{}/scheduler", self.base_url))
                .json(action),
        )
        .await
    }

    async fn update_task(
        &self,
        task_id: &str,
        updates: &TaskUpdates,
    ) -> Result<(), SchedulerError> {
        self.mutate(
            self.client
                .put(format!("{}/tasks", self.base_url))
                .json(&json!({ "taskId": task_id, "updates": updates })),
        )
        .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), SchedulerError> {
        self.mutate(
            self.client
                .delete(format!("{}/tasks", self.base_url))
                .query(&[("taskId", task_id)]),
        )
        .await
    }
}

async fn failure_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
        return parsed.error;
    }
    match body.trim() {
        "" => format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string(),
        text => text.to_string(),
    }
}
