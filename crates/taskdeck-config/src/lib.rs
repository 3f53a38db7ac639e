use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },
}

/// Connection settings for the remote scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Base URL, e.g. "http://127.0.0.1:8080/api".
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token sent with every request (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl SchedulerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

/// Connection and polling settings for the remote job service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Seconds between poll ticks while jobs are pending.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Job types watched from startup, before any submission.
    #[serde(default)]
    pub watched_types: Vec<String>,
}

impl JobsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
            poll_interval_secs: default_poll_interval_secs(),
            watched_types: Vec::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    3
}

/// Top-level taskdeck configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskdeckConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Resolve the taskdeck config directory (~/.taskdeck/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".taskdeck"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.taskdeck/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, then apply environment overrides.
pub fn load_config() -> Result<TaskdeckConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    let mut config = load_config_from(&path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<TaskdeckConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(TaskdeckConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TaskdeckConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Apply `TASKDECK_*` overrides. `lookup` returns the value of a variable, if set.
///
/// `TASKDECK_API_TOKEN` applies to both services.
pub fn apply_env_overrides<F>(config: &mut TaskdeckConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("TASKDECK_SCHEDULER_URL") {
        config.scheduler.base_url = url;
    }
    if let Some(url) = lookup("TASKDECK_JOBS_URL") {
        config.jobs.base_url = url;
    }
    if let Some(token) = lookup("TASKDECK_API_TOKEN") {
        config.scheduler.auth_token = Some(token.clone());
        config.jobs.auth_token = Some(token);
    }
    if let Some(value) = lookup("TASKDECK_POLL_INTERVAL_SECS") {
        config.jobs.poll_interval_secs =
            value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "TASKDECK_POLL_INTERVAL_SECS".into(),
                value: value.clone(),
            })?;
    }
    Ok(())
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &TaskdeckConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
