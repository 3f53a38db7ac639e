use anyhow::Result;
use chrono::Utc;

use crate::CronCommand;

/// Run a `cron` subcommand. Purely local, no network access.
pub fn run(command: CronCommand) -> Result<()> {
    match command {
        CronCommand::Parse { expression } => {
            let spec = taskdeck_cron::parse(&expression)?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }
        CronCommand::Generate(schedule) => {
            println!("{}", taskdeck_cron::generate(&schedule.to_spec()));
        }
        CronCommand::Describe { expression } => {
            println!("{}", taskdeck_cron::describe(&expression)?);
        }
        CronCommand::Next { expression, count } => {
            let runs = taskdeck_cron::upcoming(&expression, Utc::now(), count)?;
            if runs.is_empty() {
                println!("No upcoming runs");
            }
            for run in runs {
                println!("{}", run.format("%Y-%m-%d %H:%M UTC (%a)"));
            }
        }
    }
    Ok(())
}
