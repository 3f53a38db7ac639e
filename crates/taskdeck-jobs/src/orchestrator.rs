//! Job orchestration: optimistic submission, dedup and self-stopping polling.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskdeck_hooks::{HookRegistry, JobEvent};
use taskdeck_types::{Job, JobRequest, JobStatus};

use crate::service::{JobService, SkipNotice, SubmitResponse};
use crate::store::{JobStore, MergeOutcome, TEMP_ID_PREFIX};
use crate::{JobError, Result};

/// What happened to a submission the caller should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The service created a job; it is now tracked and polled.
    Accepted(Job),
    /// The service already had results for this subject; nothing is tracked.
    Skipped(SkipNotice),
}

/// Summary of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub stale: usize,
    pub finished: usize,
    /// Pending jobs the service stopped reporting.
    pub removed: usize,
    pub failed_types: Vec<String>,
}

struct State {
    store: JobStore,
    watched: BTreeSet<String>,
    /// Set while a poll loop task is alive. Only flipped under this lock.
    polling: bool,
}

impl State {
    fn watched_pending_types(&self) -> Vec<String> {
        self.store
            .pending_types()
            .into_iter()
            .filter(|t| self.watched.contains(t))
            .collect()
    }
}

struct Inner {
    service: Arc<dyn JobService>,
    hooks: Option<Arc<HookRegistry>>,
    poll_interval: Duration,
    state: Mutex<State>,
}

/// Submits background jobs and keeps the job store in step with the service.
///
/// Cloning is cheap and every clone shares the same store.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl JobOrchestrator {
    pub fn new(service: Arc<dyn JobService>, poll_interval: Duration) -> Self {
        Self::with_hooks(service, poll_interval, None)
    }

    /// Create an orchestrator that reports lifecycle events to `hooks`.
    pub fn with_hooks(
        service: Arc<dyn JobService>,
        poll_interval: Duration,
        hooks: Option<Arc<HookRegistry>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                hooks,
                poll_interval,
                state: Mutex::new(State {
                    store: JobStore::new(),
                    watched: BTreeSet::new(),
                    polling: false,
                }),
            }),
        }
    }

    /// Add a job type to the set the polling loop refreshes.
    pub async fn watch(&self, job_type: &str) {
        let mut state = self.inner.state.lock().await;
        state.watched.insert(job_type.to_string());
        self.inner.ensure_polling(&mut state);
    }

    /// Submit work for `(job_type, dedup_key)`.
    ///
    /// Rejected locally with [`JobError::AlreadyInProgress`] while a matching
    /// job is pending. Otherwise an optimistic queued job is visible in the
    /// store until the service answers.
    pub async fn submit(
        &self,
        job_type: &str,
        dedup_key: &str,
        payload: Value,
    ) -> Result<SubmitOutcome> {
        let temp = {
            let mut state = self.inner.state.lock().await;
            if state
                .store
                .by_dedup_key(job_type, dedup_key)
                .is_some_and(|job| !job.is_terminal())
            {
                debug!(job_type, dedup_key, "Submission rejected, job already in progress");
                return Err(JobError::AlreadyInProgress {
                    job_type: job_type.to_string(),
                    dedup_key: dedup_key.to_string(),
                });
            }
            let temp = Job::queued(
                format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()),
                job_type,
                dedup_key,
            );
            state.store.add(temp.clone());
            state.watched.insert(job_type.to_string());
            temp
        };
        self.inner.emit(JobEvent::Submitted { job: temp.clone() }).await;

        let request = JobRequest {
            job_type: job_type.to_string(),
            dedup_key: dedup_key.to_string(),
            data: payload,
        };
        let response = self.inner.service.submit(&request).await;

        match response {
            Ok(SubmitResponse::Accepted(job)) => {
                let mut job = job.normalized(dedup_key);
                job.dedup_key = dedup_key.to_string();
                let job = {
                    let mut state = self.inner.state.lock().await;
                    state.store.remove(&temp.id);
                    // A poll may already have seen this id further along.
                    let id = job.id.clone();
                    state.store.merge(job.clone());
                    self.inner.ensure_polling(&mut state);
                    state.store.get(&id).unwrap_or(job)
                };
                info!(job_id = %job.id, job_type, dedup_key, status = %job.status, "Job accepted");
                self.inner.emit(JobEvent::Accepted { job: job.clone() }).await;
                Ok(SubmitOutcome::Accepted(job))
            }
            Ok(SubmitResponse::Skipped(notice)) => {
                self.inner.state.lock().await.store.remove(&temp.id);
                info!(
                    job_type,
                    dedup_key,
                    existing_count = ?notice.existing_count,
                    "Job skipped, work already satisfied"
                );
                self.inner
                    .emit(JobEvent::Skipped {
                        job_type: job_type.to_string(),
                        dedup_key: dedup_key.to_string(),
                        existing_count: notice.existing_count,
                        message: notice.message.clone(),
                    })
                    .await;
                Ok(SubmitOutcome::Skipped(notice))
            }
            Err(e) => {
                self.inner.state.lock().await.store.remove(&temp.id);
                warn!(job_type, dedup_key, "Job submission failed: {e}");
                self.inner
                    .emit(JobEvent::SubmissionFailed {
                        job_type: job_type.to_string(),
                        dedup_key: dedup_key.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                Err(JobError::SubmissionFailed(e.to_string()))
            }
        }
    }

    /// Load the authoritative job list and reconcile the store against it.
    ///
    /// Confirmed jobs of the requested type (all types when `None`) that the
    /// service no longer reports are dropped; the rest merge monotonically.
    /// Returns the number of jobs the service reported.
    pub async fn reconcile(&self, job_type: Option<&str>) -> Result<usize> {
        let jobs = self.inner.service.list_jobs(job_type).await?;
        let count = jobs.len();
        let keep: HashSet<String> = jobs.iter().map(|j| j.id.clone()).collect();

        let finished = {
            let mut state = self.inner.state.lock().await;
            let removed = state.store.prune_missing(job_type, &keep);
            match job_type {
                Some(t) => {
                    state.watched.insert(t.to_string());
                }
                None => {
                    let types: Vec<String> = jobs.iter().map(|j| j.job_type.clone()).collect();
                    state.watched.extend(types);
                }
            }
            let mut report = PollReport::default();
            let finished = merge_all(&mut state.store, jobs, &mut report);
            self.inner.ensure_polling(&mut state);
            info!(
                job_type = job_type.unwrap_or("*"),
                loaded = count,
                removed,
                stale = report.stale,
                "Job store reconciled"
            );
            finished
        };
        for job in finished {
            self.inner.emit(JobEvent::Finished { job }).await;
        }
        Ok(count)
    }

    /// Run one poll tick now, outside the regular interval.
    pub async fn poll_once(&self) -> PollReport {
        let report = self.inner.poll_tick().await;
        let mut state = self.inner.state.lock().await;
        self.inner.ensure_polling(&mut state);
        report
    }

    /// Whether a pending job exists for `(job_type, dedup_key)`.
    pub async fn is_in_progress(&self, job_type: &str, dedup_key: &str) -> bool {
        self.job(job_type, dedup_key)
            .await
            .is_some_and(|job| !job.is_terminal())
    }

    /// Short display text for the job tracking `(job_type, dedup_key)`.
    pub async fn status_label(&self, job_type: &str, dedup_key: &str) -> Option<String> {
        self.job(job_type, dedup_key).await.as_ref().map(status_label)
    }

    pub async fn job(&self, job_type: &str, dedup_key: &str) -> Option<Job> {
        let state = self.inner.state.lock().await;
        state.store.by_dedup_key(job_type, dedup_key)
    }

    pub async fn jobs(&self, job_type: &str) -> Vec<Job> {
        self.inner.state.lock().await.store.by_type(job_type)
    }

    pub async fn all_jobs(&self) -> Vec<Job> {
        self.inner.state.lock().await.store.all()
    }

    pub async fn remove(&self, id: &str) -> Option<Job> {
        self.inner.state.lock().await.store.remove(id)
    }

    /// Forget finished jobs of one type. Returns how many were removed.
    pub async fn clear_finished(&self, job_type: &str) -> usize {
        self.inner.state.lock().await.store.clear_finished(job_type)
    }

    pub async fn is_polling(&self) -> bool {
        self.inner.state.lock().await.polling
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    pub async fn watched_types(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        state.watched.iter().cloned().collect()
    }
}

impl Inner {
    async fn emit(&self, event: JobEvent) {
        if let Some(hooks) = &self.hooks {
            hooks.emit(event).await;
        }
    }

    /// Spawn the poll loop if pending work exists and none is running.
    ///
    /// Must be called with the state lock held; the loop clears `polling`
    /// under the same lock, so a new job can never be left unpolled.
    fn ensure_polling(self: &Arc<Self>, state: &mut State) {
        if state.polling || state.watched_pending_types().is_empty() {
            return;
        }
        state.polling = true;
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_poll_loop().await;
        });
    }

    async fn run_poll_loop(self: Arc<Self>) {
        info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            "Job polling loop started"
        );
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let report = self.poll_tick().await;
            debug!(
                fetched = report.fetched,
                updated = report.updated,
                stale = report.stale,
                finished = report.finished,
                removed = report.removed,
                failed = report.failed_types.len(),
                "Job poll tick"
            );

            let mut state = self.state.lock().await;
            if state.watched_pending_types().is_empty() {
                state.polling = false;
                break;
            }
        }
        info!("Job polling loop stopped, no pending jobs");
    }

    async fn poll_tick(&self) -> PollReport {
        let mut report = PollReport::default();
        let job_types = self.state.lock().await.watched_pending_types();

        for job_type in job_types {
            let known = self.state.lock().await.store.pending_ids(&job_type);
            match self.service.list_jobs(Some(&job_type)).await {
                Ok(jobs) => {
                    let reported: HashSet<String> = jobs.iter().map(|j| j.id.clone()).collect();
                    let finished = {
                        let mut state = self.state.lock().await;
                        for job in state.store.drop_vanished(&known, &reported) {
                            info!(job_id = %job.id, job_type = %job.job_type, "Job no longer reported by the service, dropped");
                            report.removed += 1;
                        }
                        merge_all(&mut state.store, jobs, &mut report)
                    };
                    for job in finished {
                        info!(job_id = %job.id, job_type = %job.job_type, status = %job.status, "Job finished");
                        self.emit(JobEvent::Finished { job }).await;
                    }
                }
                Err(e) => {
                    warn!(job_type = %job_type, "Job poll failed, retrying next tick: {e}");
                    self.emit(JobEvent::PollFailed {
                        job_type: job_type.clone(),
                        error: e.to_string(),
                    })
                    .await;
                    report.failed_types.push(job_type);
                }
            }
        }
        report
    }
}

/// Merge a snapshot into the store, returning jobs that just finished.
///
/// Records are normalized first; an empty dedup key is filled by the merge.
fn merge_all(store: &mut JobStore, jobs: Vec<Job>, report: &mut PollReport) -> Vec<Job> {
    let mut finished = Vec::new();
    for job in jobs {
        report.fetched += 1;
        let id = job.id.clone();
        match store.merge(job.normalized("")) {
            MergeOutcome::Inserted => report.inserted += 1,
            MergeOutcome::Updated { became_terminal } => {
                report.updated += 1;
                if became_terminal {
                    report.finished += 1;
                    finished.extend(store.get(&id));
                }
            }
            MergeOutcome::Unchanged => {}
            MergeOutcome::Stale => {
                debug!(job_id = %id, "Discarded stale job update");
                report.stale += 1;
            }
        }
    }
    finished
}

/// Short display text for a job's status and progress.
pub fn status_label(job: &Job) -> String {
    match job.status {
        JobStatus::Queued => "Queued".to_string(),
        JobStatus::Processing | JobStatus::Active => {
            let name = if job.status == JobStatus::Active {
                "Active"
            } else {
                "Processing"
            };
            if job.progress > 0 {
                format!("{name} {}%", job.progress)
            } else {
                name.to_string()
            }
        }
        JobStatus::Completed => "Completed".to_string(),
        JobStatus::Failed => match &job.error {
            Some(error) => format!("Failed: {error}"),
            None => "Failed".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::JobServiceError;
    use taskdeck_hooks::{JobEventKind, handler};

    const KW: &str = "keyword-generation";
    const TICK: Duration = Duration::from_secs(3);

    #[derive(Default)]
    struct MockJobService {
        submit_calls: AtomicUsize,
        list_calls: AtomicUsize,
        submits: StdMutex<VecDeque<std::result::Result<SubmitResponse, JobServiceError>>>,
        lists: StdMutex<VecDeque<std::result::Result<Vec<Job>, JobServiceError>>>,
    }

    impl MockJobService {
        fn on_submit(&self, resp: std::result::Result<SubmitResponse, JobServiceError>) {
            self.submits.lock().unwrap().push_back(resp);
        }

        fn on_list(&self, resp: std::result::Result<Vec<Job>, JobServiceError>) {
            self.lists.lock().unwrap().push_back(resp);
        }

        fn submit_calls(&self) -> usize {
            self.submit_calls.load(Ordering::SeqCst)
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobService for MockJobService {
        async fn submit(
            &self,
            _request: &JobRequest,
        ) -> std::result::Result<SubmitResponse, JobServiceError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            // Let other futures observe the in-flight state.
            tokio::task::yield_now().await;
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(JobServiceError::Decode("no scripted response".into())))
        }

        async fn list_jobs(
            &self,
            _job_type: Option<&str>,
        ) -> std::result::Result<Vec<Job>, JobServiceError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.lists.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn server_job(id: &str, key: &str, status: JobStatus, progress: u8) -> Job {
        let mut job = Job::queued(id, KW, key);
        job.status = status;
        job.progress = progress;
        job
    }

    fn setup() -> (Arc<MockJobService>, JobOrchestrator) {
        let service = Arc::new(MockJobService::default());
        let orchestrator = JobOrchestrator::new(service.clone(), TICK);
        (service, orchestrator)
    }

    fn rejected() -> JobServiceError {
        JobServiceError::Rejected {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_accepted_replaces_temp_job() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "",
            JobStatus::Queued,
            0,
        ))));

        let outcome = orch.submit(KW, "industry-1", json!({"industryId": 1})).await.unwrap();
        let SubmitOutcome::Accepted(job) = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(job.id, "srv-1");
        assert_eq!(job.dedup_key, "industry-1");

        let jobs = orch.jobs(KW).await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "srv-1");
        assert!(orch.is_in_progress(KW, "industry-1").await);
        assert_eq!(orch.status_label(KW, "industry-1").await.as_deref(), Some("Queued"));
        assert!(orch.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_submit_makes_one_request() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));

        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        let err = orch.submit(KW, "industry-1", json!({})).await.unwrap_err();
        assert!(matches!(err, JobError::AlreadyInProgress { .. }));
        assert_eq!(service.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_duplicate_submit_while_in_flight() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));

        let (first, second) = tokio::join!(
            orch.submit(KW, "industry-1", json!({})),
            orch.submit(KW, "industry-1", json!({})),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(JobError::AlreadyInProgress { .. })));
        assert_eq!(service.submit_calls(), 1);
        assert_eq!(orch.jobs(KW).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_allowed_after_previous_job_finished() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Completed,
            100,
        ))));
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-2",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));

        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert!(!orch.is_polling().await);
        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert_eq!(service.submit_calls(), 2);
        assert_eq!(orch.job(KW, "industry-1").await.unwrap().id, "srv-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_submission_leaves_no_job() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Skipped(SkipNotice {
            existing_count: Some(250),
            message: Some("already has 250 keywords".into()),
        })));

        let outcome = orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Skipped(SkipNotice {
                existing_count: Some(250),
                message: Some("already has 250 keywords".into()),
            })
        );
        assert!(orch.job(KW, "industry-1").await.is_none());
        assert!(orch.all_jobs().await.is_empty());
        assert!(!orch.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_removes_temp_job_without_retry() {
        let (service, orch) = setup();
        service.on_submit(Err(rejected()));

        let err = orch.submit(KW, "industry-1", json!({})).await.unwrap_err();
        match err {
            JobError::SubmissionFailed(message) => assert!(message.contains("unavailable")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(orch.all_jobs().await.is_empty());
        assert_eq!(service.submit_calls(), 1);
        assert!(!orch.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_temp_job_visible_while_in_flight() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));

        let submitter = orch.clone();
        let handle = tokio::spawn(async move { submitter.submit(KW, "industry-1", json!({})).await });
        tokio::task::yield_now().await;

        let pending = orch.job(KW, "industry-1").await.unwrap();
        assert!(pending.id.starts_with(TEMP_ID_PREFIX));
        assert_eq!(pending.status, JobStatus::Queued);

        handle.await.unwrap().unwrap();
        assert_eq!(orch.job(KW, "industry-1").await.unwrap().id, "srv-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_after_last_job_finishes() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));
        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Active, 50)]));
        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Completed, 100)]));

        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert!(orch.is_polling().await);

        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert_eq!(service.list_calls(), 1);
        assert_eq!(
            orch.status_label(KW, "industry-1").await.as_deref(),
            Some("Active 50%")
        );
        assert!(orch.is_polling().await);

        tokio::time::sleep(TICK).await;
        assert_eq!(service.list_calls(), 2);
        assert_eq!(
            orch.status_label(KW, "industry-1").await.as_deref(),
            Some("Completed")
        );
        assert!(!orch.is_in_progress(KW, "industry-1").await);
        assert!(!orch.is_polling().await);

        tokio::time::sleep(TICK * 10).await;
        assert_eq!(service.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_restarts_on_new_submission() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));
        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Failed, 0)]));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();

        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert!(!orch.is_polling().await);

        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-2",
            "industry-2",
            JobStatus::Queued,
            0,
        ))));
        service.on_list(Ok(vec![server_job("srv-2", "industry-2", JobStatus::Completed, 100)]));
        orch.submit(KW, "industry-2", json!({})).await.unwrap();
        assert!(orch.is_polling().await);

        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert_eq!(service.list_calls(), 2);
        assert!(!orch.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_pending_job_disappears() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Active,
            30,
        ))));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert!(orch.is_polling().await);

        // The service removed the job; every list comes back empty.
        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert_eq!(service.list_calls(), 1);
        assert!(orch.job(KW, "industry-1").await.is_none());
        assert!(!orch.is_in_progress(KW, "industry-1").await);
        assert!(!orch.is_polling().await);

        tokio::time::sleep(TICK * 10).await;
        assert_eq!(service.list_calls(), 1);

        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-2",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        assert_eq!(service.submit_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polled_completion_is_normalized() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Processing,
            10,
        ))));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();

        service.on_list(Ok(vec![server_job("srv-1", "", JobStatus::Completed, 40)]));
        let report = orch.poll_once().await;
        assert_eq!(report.finished, 1);
        assert_eq!(report.removed, 0);

        let job = orch.job(KW, "industry-1").await.unwrap();
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert_eq!(job.dedup_key, "industry-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_store_and_loop() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Processing,
            20,
        ))));
        service.on_list(Err(rejected()));
        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Completed, 100)]));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();

        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert_eq!(service.list_calls(), 1);
        assert_eq!(
            orch.status_label(KW, "industry-1").await.as_deref(),
            Some("Processing 20%")
        );
        assert!(orch.is_polling().await);

        tokio::time::sleep(TICK).await;
        assert_eq!(service.list_calls(), 2);
        assert!(!orch.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_poll_does_not_regress_completed_job() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Queued,
            0,
        ))));
        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Completed, 100)]));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();
        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert!(!orch.is_polling().await);

        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Queued, 0)]));
        assert_eq!(orch.reconcile(Some(KW)).await.unwrap(), 1);
        assert!(!orch.is_polling().await);
        assert_eq!(
            orch.job(KW, "industry-1").await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_once_reports_stale_and_failures() {
        let (service, orch) = setup();
        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-1",
            "industry-1",
            JobStatus::Active,
            60,
        ))));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();

        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Queued, 0)]));
        let report = orch.poll_once().await;
        assert_eq!(report.fetched, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(orch.job(KW, "industry-1").await.unwrap().status, JobStatus::Active);

        service.on_list(Err(rejected()));
        let report = orch.poll_once().await;
        assert_eq!(report.failed_types, vec![KW.to_string()]);
        assert_eq!(orch.job(KW, "industry-1").await.unwrap().progress, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_loads_and_starts_polling() {
        let (service, orch) = setup();
        service.on_list(Ok(vec![
            server_job("srv-1", "industry-1", JobStatus::Active, 10),
            server_job("srv-2", "industry-2", JobStatus::Completed, 100),
        ]));

        assert_eq!(orch.reconcile(Some(KW)).await.unwrap(), 2);
        assert!(orch.is_in_progress(KW, "industry-1").await);
        assert!(!orch.is_in_progress(KW, "industry-2").await);
        assert!(orch.is_polling().await);
        assert_eq!(orch.watched_types().await, vec![KW.to_string()]);

        service.on_list(Ok(vec![server_job("srv-1", "industry-1", JobStatus::Completed, 100)]));
        assert_eq!(orch.reconcile(Some(KW)).await.unwrap(), 1);
        assert!(orch.job(KW, "industry-2").await.is_none());
        assert_eq!(orch.clear_finished(KW).await, 1);
        assert!(orch.all_jobs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_receive_lifecycle_events() {
        let service = Arc::new(MockJobService::default());
        let hooks = Arc::new(HookRegistry::new());
        let skipped = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        for (kind, counter) in [
            (JobEventKind::Skipped, skipped.clone()),
            (JobEventKind::Finished, finished.clone()),
        ] {
            let count = handler(move |_event| {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            });
            hooks.on(kind, count).await;
        }
        let orch = JobOrchestrator::with_hooks(service.clone(), TICK, Some(hooks));

        service.on_submit(Ok(SubmitResponse::Skipped(SkipNotice::default())));
        orch.submit(KW, "industry-1", json!({})).await.unwrap();

        service.on_submit(Ok(SubmitResponse::Accepted(server_job(
            "srv-2",
            "industry-2",
            JobStatus::Queued,
            0,
        ))));
        service.on_list(Ok(vec![server_job("srv-2", "industry-2", JobStatus::Completed, 100)]));
        orch.submit(KW, "industry-2", json!({})).await.unwrap();

        tokio::time::sleep(TICK * 2).await;
        assert_eq!(skipped.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_label() {
        let mut job = Job::queued("j1", KW, "a");
        assert_eq!(status_label(&job), "Queued");
        job.status = JobStatus::Processing;
        assert_eq!(status_label(&job), "Processing");
        job.progress = 45;
        assert_eq!(status_label(&job), "Processing 45%");
        job.status = JobStatus::Active;
        assert_eq!(status_label(&job), "Active 45%");
        job.status = JobStatus::Completed;
        assert_eq!(status_label(&job), "Completed");
        job.status = JobStatus::Failed;
        assert_eq!(status_label(&job), "Failed");
        job.error = Some("quota exceeded".into());
        assert_eq!(status_label(&job), "Failed: quota exceeded");
    }
}
