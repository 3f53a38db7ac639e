mod cron;
mod jobs;
mod tasks;

use clap::{Args, Parser, Subcommand, ValueEnum};
use taskdeck_cron::{Frequency, RecurrenceSpec, TimeOfDay};

#[derive(Parser)]
#[command(name = "taskdeck", about = "Scheduled task and background job CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate between cron expressions and recurrence schedules
    Cron {
        #[command(subcommand)]
        command: CronCommand,
    },
    /// Manage tasks on the remote scheduler
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
    /// Submit and track background jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum CronCommand {
    /// Classify a cron expression into a recurrence schedule (printed as JSON)
    Parse { expression: String },
    /// Build a cron expression from a recurrence schedule
    Generate(ScheduleArgs),
    /// Describe a cron expression in plain English
    Describe { expression: String },
    /// Show the next run times of a cron expression
    Next {
        expression: String,

        /// Number of run times to show
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Subcommand)]
pub enum TasksCommand {
    /// List tasks with their schedules
    List {
        /// Number of upcoming run times to show per task
        #[arg(long, default_value_t = 0)]
        upcoming: usize,
    },
    /// Start the scheduler
    Start,
    /// Stop the scheduler
    Stop,
    /// Ask the scheduler to reload its tasks
    Refresh,
    /// Run a task now
    Trigger { task_id: String },
    /// Enable a task
    Enable { task_id: String },
    /// Disable a task
    Disable { task_id: String },
    /// Replace a task's cron expression
    SetCron { task_id: String, expression: String },
    /// Replace a task's schedule from a recurrence description
    SetSchedule {
        task_id: String,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Delete a task
    Delete { task_id: String },
}

#[derive(Subcommand)]
pub enum JobsCommand {
    /// Submit a job and follow it until it finishes
    Submit {
        /// Job type (e.g. "keyword-generation")
        job_type: String,

        /// Deduplication key identifying the subject of the work
        dedup_key: String,

        /// JSON payload sent with the job
        #[arg(short, long, default_value = "{}")]
        data: String,

        /// Return right after submission instead of following the job
        #[arg(long)]
        no_wait: bool,
    },
    /// List jobs known to the job service
    List {
        /// Only jobs of this type
        #[arg(short = 't', long = "type")]
        job_type: Option<String>,
    },
    /// Follow pending jobs of the given types until none remain
    Watch {
        /// Job types to follow (defaults to `jobs.watched_types` from config)
        job_types: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file if none exists
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    EveryMinute,
    EveryNMinutes,
    EveryNHours,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl From<FrequencyArg> for Frequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::EveryMinute => Frequency::EveryMinute,
            FrequencyArg::EveryNMinutes => Frequency::EveryNMinutes,
            FrequencyArg::EveryNHours => Frequency::EveryNHours,
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Custom => Frequency::Custom,
        }
    }
}

/// Recurrence flags shared by `cron generate` and `tasks set-schedule`.
#[derive(Args)]
pub struct ScheduleArgs {
    #[arg(value_enum)]
    frequency: FrequencyArg,

    /// Time of day in UTC, HH:MM
    #[arg(long)]
    at: Option<TimeOfDay>,

    /// Interval for every-n-minutes / every-n-hours
    #[arg(long)]
    interval: Option<i64>,

    /// Day of week, 0 = Sunday
    #[arg(long)]
    day_of_week: Option<u32>,

    /// Day of month, 1-31
    #[arg(long)]
    day_of_month: Option<u32>,

    /// Raw cron expression for the custom frequency
    #[arg(long)]
    expression: Option<String>,
}

impl ScheduleArgs {
    pub fn to_spec(&self) -> RecurrenceSpec {
        RecurrenceSpec {
            frequency: self.frequency.into(),
            time_of_day: self.at,
            interval: self.interval,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            custom_expression: self.expression.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cron { command } => cron::run(command)?,
        Commands::Tasks { command } => {
            let config = taskdeck_config::load_config()?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(tasks::run(command, &config.scheduler))?;
        }
        Commands::Jobs { command } => {
            let config = taskdeck_config::load_config()?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(jobs::run(command, &config.jobs))?;
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                let config = taskdeck_config::load_config()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommand::Init => {
                let path = taskdeck_config::config_file_path()?;
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    taskdeck_config::save_config(&taskdeck_config::TaskdeckConfig::default())?;
                    println!("Wrote default config to {}", path.display());
                }
            }
        },
    }

    Ok(())
}
