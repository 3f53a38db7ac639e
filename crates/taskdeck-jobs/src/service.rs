//! Remote job service: trait seam plus the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use taskdeck_types::{Job, JobRequest};

use crate::JobServiceError;

/// Notice returned when the service reports the work as already satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipNotice {
    /// How many results already exist for the subject, when reported.
    #[serde(default, alias = "count", skip_serializing_if = "Option::is_none")]
    pub existing_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a submission the service did not reject.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    /// A job was created.
    Accepted(Job),
    /// No job was created because the work is already done.
    Skipped(SkipNotice),
}

/// The remote surface the orchestrator submits to and polls.
#[async_trait]
pub trait JobService: Send + Sync {
    /// `POST jobs {type, dedupKey, data}`.
    async fn submit(&self, request: &JobRequest) -> Result<SubmitResponse, JobServiceError>;

    /// `GET jobs[?type]`, the authoritative snapshot.
    async fn list_jobs(&self, job_type: Option<&str>) -> Result<Vec<Job>, JobServiceError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobEnvelope {
    Wrapped { job: Job },
    Bare(Job),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobListEnvelope {
    Wrapped { jobs: Vec<Job> },
    Bare(Vec<Job>),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// HTTP client for the job service.
pub struct HttpJobService {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpJobService {
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

    fn jobs_url(&self) -> String {
        format!("{}/jobs", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn submit(&self, request: &JobRequest) -> Result<SubmitResponse, JobServiceError> {
        let resp = self
            .authorize(self.client.post(self.jobs_url()).json(request))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status == StatusCode::CONFLICT {
            let notice: SkipNotice = serde_json::from_str(&body).unwrap_or_default();
            return Ok(SubmitResponse::Skipped(notice));
        }
        if !status.is_success() {
            return Err(JobServiceError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let envelope: JobEnvelope = serde_json::from_str(&body)
            .map_err(|e| JobServiceError::Decode(format!("submit response: {e}")))?;
        let job = match envelope {
            JobEnvelope::Wrapped { job } | JobEnvelope::Bare(job) => job,
        };
        Ok(SubmitResponse::Accepted(job))
    }

    async fn list_jobs(&self, job_type: Option<&str>) -> Result<Vec<Job>, JobServiceError> {
        let mut request = self.client.get(self.jobs_url());
        if let Some(job_type) = job_type {
            request = request.query(&[("type", job_type)]);
        }
        let resp = self.authorize(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(JobServiceError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let envelope: JobListEnvelope = serde_json::from_str(&body)
            .map_err(|e| JobServiceError::Decode(format!("job list: {e}")))?;
        Ok(match envelope {
            JobListEnvelope::Wrapped { jobs } | JobListEnvelope::Bare(jobs) => jobs,
        })
    }
}

/// Best-effort error text from a failed response body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use taskdeck_types::JobStatus;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/")
    }

    fn request(dedup_key: &str) -> JobRequest {
        JobRequest {
            job_type: "keyword-generation".into(),
            dedup_key: dedup_key.into(),
            data: json!({"industryId": 4}),
        }
    }

    async fn submit_handler(headers: HeaderMap, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret");
        match body["dedupKey"].as_str() {
            _ if !authorized => (AxumStatus::UNAUTHORIZED, Json(json!({"error": "bad token"}))),
            Some("satisfied") => (
                AxumStatus::CONFLICT,
                Json(json!({"skipped": true, "existingCount": 250, "message": "already has 250 keywords"})),
            ),
            Some("broken") => (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "industryId is required"})),
            ),
            Some(key) => (
                AxumStatus::CREATED,
                Json(json!({"job": {
                    "id": "srv-1",
                    "type": body["type"],
                    "status": "waiting",
                    "progress": 0,
                    "dedupKey": key,
                }})),
            ),
            None => (AxumStatus::BAD_REQUEST, Json(json!({"error": "missing dedupKey"}))),
        }
    }

    async fn list_handler(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        let job_type = query.get("type").cloned().unwrap_or_default();
        Json(json!({"jobs": [
            {"id": "srv-1", "type": job_type, "status": "active", "progress": 35.0, "dedupKey": "industry-4"},
            {"id": "srv-2", "type": job_type, "status": "completed", "dedupKey": "industry-5", "result": {"keywords": 120}},
        ]}))
    }

    async fn service() -> HttpJobService {
        let app = Router::new().route("/api/jobs", post(submit_handler).get(list_handler));
        let base = spawn_server(app).await;
        HttpJobService::new(&base, Duration::from_secs(5), Some("secret".into()))
    }

    #[tokio::test]
    async fn test_submit_accepted() {
        let svc = service().await;
        let resp = svc.submit(&request("industry-4")).await.unwrap();
        let SubmitResponse::Accepted(job) = resp else {
            panic!("expected acceptance, got {resp:?}");
        };
        assert_eq!(job.id, "srv-1");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.dedup_key, "industry-4");
    }

    #[tokio::test]
    async fn test_submit_skipped() {
        let svc = service().await;
        let resp = svc.submit(&request("satisfied")).await.unwrap();
        assert_eq!(
            resp,
            SubmitResponse::Skipped(SkipNotice {
                existing_count: Some(250),
                message: Some("already has 250 keywords".into()),
            })
        );
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let svc = service().await;
        let err = svc.submit(&request("broken")).await.unwrap_err();
        match err {
            JobServiceError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "industryId is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_without_token_is_rejected() {
        let app = Router::new().route("/api/jobs", post(submit_handler));
        let base = spawn_server(app).await;
        let svc = HttpJobService::new(&base, Duration::from_secs(5), None);
        let err = svc.submit(&request("industry-4")).await.unwrap_err();
        assert!(matches!(err, JobServiceError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let svc = service().await;
        let jobs = svc.list_jobs(Some("keyword-generation")).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_type, "keyword-generation");
        assert_eq!(jobs[0].progress, 35);
        assert_eq!(jobs[1].status, JobStatus::Completed);
        assert_eq!(jobs[1].result, Some(json!({"keywords": 120})));
    }

    #[tokio::test]
    async fn test_connection_error_is_http() {
        let svc = HttpJobService::new("http://127.0.0.1:1/api", Duration::from_secs(2), None);
        let err = svc.list_jobs(None).await.unwrap_err();
        assert!(matches!(err, JobServiceError::Http(_)));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, r#"{"message":"upstream down"}"#),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, " gateway timeout \n"), "gateway timeout");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }
}
