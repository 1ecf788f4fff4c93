use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration loaded from `~/.caretaker/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub caretaker: CaretakerConfig,
    #[serde(default)]
    pub election: ElectionConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Config {
    /// Load config from `~/.caretaker/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.caretaker.validate()?;
        self.election.validate()?;

        let mut names = std::collections::BTreeSet::new();
        for job in &self.jobs {
            job.validate()?;
            if !names.insert(job.name.trim()) {
                return Err(ConfigError::Validation(format!(
                    "jobs: duplicate job name '{}'",
                    job.name.trim()
                )));
            }
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".caretaker")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_node_name() -> String {
    "caretaker".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

/// What to do with a job whose previous invocation is still running when
/// the next leader tick fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start another invocation regardless.
    #[default]
    Concurrent,
    /// Skip the job for this tick.
    SkipIfRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaretakerConfig {
    #[serde(default = "default_tick_period_secs")]
    pub tick_period_secs: u64,
    #[serde(default = "default_leadership_timeout_secs")]
    pub leadership_timeout_secs: u64,
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

impl Default for CaretakerConfig {
    fn default() -> Self {
        Self {
            tick_period_secs: default_tick_period_secs(),
            leadership_timeout_secs: default_leadership_timeout_secs(),
            overlap: OverlapPolicy::default(),
        }
    }
}

fn default_tick_period_secs() -> u64 {
    60
}
fn default_leadership_timeout_secs() -> u64 {
    10
}

impl CaretakerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }

    pub fn leadership_timeout(&self) -> Duration {
        Duration::from_secs(self.leadership_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_secs == 0 {
            return Err(ConfigError::Validation(
                "caretaker.tick_period_secs must be greater than zero".to_string(),
            ));
        }
        if self.leadership_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "caretaker.leadership_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// How this node learns whether it is the elected leader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionMode {
    /// Single-node deployment: always the leader.
    #[default]
    Standalone,
    /// Never the leader; useful for warm spares.
    Passive,
    /// Ask an external probe command every tick.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(default)]
    pub mode: ElectionMode,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_election_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            mode: ElectionMode::default(),
            command: Vec::new(),
            timeout_secs: default_election_timeout_secs(),
        }
    }
}

fn default_election_timeout_secs() -> u64 {
    5
}

impl ElectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == ElectionMode::Command {
            if self.command.first().map_or(true, |c| c.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "election.command must be set when election.mode = \"command\"".to_string(),
                ));
            }
            if self.timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "election.timeout_secs must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One `[[jobs]]` entry: an external command run on every leader tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl JobConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "jobs entries must have a non-empty name".to_string(),
            ));
        }
        if self.command.first().map_or(true, |c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "jobs.{}: command must not be empty",
                self.name
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(format!(
                "jobs.{}: timeout_secs must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}
