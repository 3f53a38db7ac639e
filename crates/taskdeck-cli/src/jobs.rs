use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use taskdeck_config::JobsConfig;
use taskdeck_hooks::{HookRegistry, JobEvent, JobEventHandler, JobEventKind, handler};
use taskdeck_jobs::{HttpJobService, JobOrchestrator, JobService, SubmitOutcome, status_label};

use crate::JobsCommand;

/// Run a `jobs` subcommand against the configured job service.
pub async fn run(command: JobsCommand, config: &JobsConfig) -> Result<()> {
    let service: Arc<dyn JobService> = Arc::new(HttpJobService::new(
        &config.base_url,
        config.timeout(),
        config.auth_token.clone(),
    ));

    match command {
        JobsCommand::Submit {
            job_type,
            dedup_key,
            data,
            no_wait,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&data).context("--data is not valid JSON")?;
            let orchestrator = orchestrator(service, config).await;

            match orchestrator.submit(&job_type, &dedup_key, payload).await? {
                SubmitOutcome::Skipped(notice) => {
                    let detail = notice.message.unwrap_or_else(|| match notice.existing_count {
                        Some(n) => format!("{n} results already exist"),
                        None => "work already done".to_string(),
                    });
                    println!("Skipped {dedup_key}: {detail}");
                    return Ok(());
                }
                SubmitOutcome::Accepted(job) => {
                    println!("{} {} {}", job.id, job.dedup_key, status_label(&job));
                }
            }
            if !no_wait {
                follow(&orchestrator, &[job_type]).await;
            }
        }
        JobsCommand::List { job_type } => {
            let jobs = service.list_jobs(job_type.as_deref()).await?;
            if jobs.is_empty() {
                println!("No jobs");
            }
            for job in &jobs {
                println!(
                    "{} {} {} {}",
                    job.id,
                    job.job_type,
                    job.dedup_key,
                    status_label(job)
                );
            }
        }
        JobsCommand::Watch { job_types } => {
            let job_types = if job_types.is_empty() {
                config.watched_types.clone()
            } else {
                job_types
            };
            anyhow::ensure!(
                !job_types.is_empty(),
                "no job types given and jobs.watched_types is empty"
            );

            let orchestrator = orchestrator(service, config).await;
            for job_type in &job_types {
                let count = orchestrator.reconcile(Some(job_type)).await?;
                tracing::info!(job_type = %job_type, count, "Loaded jobs");
                orchestrator.watch(job_type).await;
            }
            follow(&orchestrator, &job_types).await;
        }
    }
    Ok(())
}

async fn orchestrator(service: Arc<dyn JobService>, config: &JobsConfig) -> JobOrchestrator {
    let hooks = Arc::new(HookRegistry::new());
    hooks
        .on(JobEventKind::PollFailed, poll_failure_printer())
        .await;
    JobOrchestrator::with_hooks(service, config.poll_interval(), Some(hooks))
}

/// Report poll failures while a job is being followed.
fn poll_failure_printer() -> JobEventHandler {
    handler(|event| async move {
        if let JobEvent::PollFailed { job_type, error } = event {
            eprintln!("Polling {job_type} failed, retrying: {error}");
        }
    })
}

/// Print status changes until no job of `job_types` is pending.
async fn follow(orchestrator: &JobOrchestrator, job_types: &[String]) {
    let mut last_seen: HashMap<String, String> = HashMap::new();
    loop {
        let mut pending = 0;
        for job_type in job_types {
            for job in orchestrator.jobs(job_type).await {
                let label = status_label(&job);
                if last_seen.get(&job.id) != Some(&label) {
                    println!("{} {} {}", job.id, job.dedup_key, label);
                    last_seen.insert(job.id.clone(), label);
                }
                if !job.is_terminal() {
                    pending += 1;
                }
            }
        }
        if pending == 0 && !orchestrator.is_polling().await {
            break;
        }
        tokio::time::sleep(orchestrator.poll_interval()).await;
    }
}
