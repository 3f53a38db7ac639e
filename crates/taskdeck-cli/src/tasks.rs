use std::sync::Arc;

use anyhow::Result;
use taskdeck_config::SchedulerConfig;
use taskdeck_scheduler::{HttpSchedulerService, SchedulerFacade, TaskSummary};

use crate::TasksCommand;

/// Run a `tasks` subcommand against the configured scheduler service.
pub async fn run(command: TasksCommand, config: &SchedulerConfig) -> Result<()> {
    let service = HttpSchedulerService::new(
        &config.base_url,
        config.timeout(),
        config.auth_token.clone(),
    );
    let facade = SchedulerFacade::new(Arc::new(service));

    match command {
        TasksCommand::List { upcoming } => {
            let summaries = facade.describe_tasks(upcoming).await?;
            if summaries.is_empty() {
                println!("No tasks");
            }
            for summary in &summaries {
                print_summary(summary);
            }
        }
        TasksCommand::Start => {
            facade.set_running(true).await?;
            println!("Scheduler started");
        }
        TasksCommand::Stop => {
            facade.set_running(false).await?;
            println!("Scheduler stopped");
        }
        TasksCommand::Refresh => {
            facade.refresh().await?;
            println!("Scheduler refreshed");
        }
        TasksCommand::Trigger { task_id } => {
            facade.trigger(&task_id).await?;
            println!("Triggered {task_id}");
        }
        TasksCommand::Enable { task_id } => {
            facade.set_enabled(&task_id, true).await?;
            println!("Enabled {task_id}");
        }
        TasksCommand::Disable { task_id } => {
            facade.set_enabled(&task_id, false).await?;
            println!("Disabled {task_id}");
        }
        TasksCommand::SetCron {
            task_id,
            expression,
        } => {
            facade.update_cron(&task_id, &expression).await?;
            println!("{task_id}: {}", describe_or_raw(&expression));
        }
        TasksCommand::SetSchedule { task_id, schedule } => {
            let cron = facade.update_schedule(&task_id, &schedule.to_spec()).await?;
            println!("{task_id}: {cron} ({})", describe_or_raw(&cron));
        }
        TasksCommand::Delete { task_id } => {
            facade.delete(&task_id).await?;
            println!("Deleted {task_id}");
        }
    }
    Ok(())
}

fn describe_or_raw(expression: &str) -> String {
    taskdeck_cron::describe(expression).unwrap_or_else(|_| expression.to_string())
}

fn print_summary(summary: &TaskSummary) {
    let task = &summary.task;
    let state = match (task.enabled, task.is_running) {
        (_, true) => "running",
        (true, false) => "enabled",
        (false, false) => "disabled",
    };
    println!("{} [{}] {}", task.id, state, task.name);
    println!("  {} ({})", summary.description, task.cron_expression);
    if let Some(last) = task.last_run {
        println!("  last run: {}", last.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(next) = task.next_run {
        println!("  next run: {}", next.format("%Y-%m-%d %H:%M UTC"));
    }
    for run in &summary.upcoming {
        println!("  upcoming: {}", run.format("%Y-%m-%d %H:%M UTC"));
    }
}
