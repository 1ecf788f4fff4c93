use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use ct_core::config::{ElectionConfig, ElectionMode, JobConfig};
use ct_core::election::{ElectionError, LeadershipOracle, StaticOracle};
use ct_core::job::{JobError, JobRegistry, MaintenanceJob};
use tracing::debug;

/// Longest stderr excerpt carried in an error message.
const STDERR_EXCERPT_BYTES: usize = 512;

enum Failure {
    Spawn(std::io::Error),
    Timeout(Duration),
}

/// Run `program args...` to completion, killing it if `timeout` elapses.
async fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<Output, Failure> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, output).await {
            Ok(result) => result.map_err(Failure::Spawn),
            Err(_) => Err(Failure::Timeout(limit)),
        },
        None => output.await.map_err(Failure::Spawn),
    }
}

fn stderr_excerpt(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_EXCERPT_BYTES {
        return trimmed.to_string();
    }
    let mut cut = trimmed.len() - STDERR_EXCERPT_BYTES;
    while !trimmed.is_char_boundary(cut) {
        cut += 1;
    }
    format!("...{}", &trimmed[cut..])
}

fn split_command(command: &[String]) -> Option<(String, Vec<String>)> {
    let (program, args) = command.split_first()?;
    if program.trim().is_empty() {
        return None;
    }
    Some((program.clone(), args.to_vec()))
}

// ---------------------------------------------------------------------------
// CommandJob
// ---------------------------------------------------------------------------

/// A maintenance job that runs an external command.
///
/// Exit status 0 is success; anything else is reported as
/// [`JobError::Failed`] with the tail of stderr.
#[derive(Debug, Clone)]
pub struct CommandJob {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandJob {
    /// `command[0]` is the program, the rest are its arguments.
    pub fn new(name: impl Into<String>, command: &[String]) -> Result<Self, JobError> {
        let name = name.into();
        let (program, args) = split_command(command)
            .ok_or_else(|| JobError::Spawn(format!("{name}: empty command")))?;
        Ok(Self {
            name,
            program,
            args,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_config(cfg: &JobConfig) -> Result<Self, JobError> {
        let job = Self::new(cfg.name.trim(), &cfg.command)?;
        Ok(match cfg.timeout() {
            Some(timeout) => job.with_timeout(timeout),
            None => job,
        })
    }
}

#[async_trait::async_trait]
impl MaintenanceJob for CommandJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), JobError> {
        let output = run_command(&self.program, &self.args, self.timeout)
            .await
            .map_err(|failure| match failure {
                Failure::Spawn(e) => JobError::Spawn(format!("{}: {e}", self.program)),
                Failure::Timeout(limit) => JobError::Timeout(limit),
            })?;

        if output.status.success() {
            debug!(job = %self.name, "command job exited cleanly");
            Ok(())
        } else {
            Err(JobError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_excerpt(&output)
            )))
        }
    }
}

/// Build the per-tick registry from the `[[jobs]]` entries.
pub fn registry_from_config(jobs: &[JobConfig]) -> Result<JobRegistry, JobError> {
    let mut registry = JobRegistry::new();
    for cfg in jobs {
        registry.register(Arc::new(CommandJob::from_config(cfg)?));
    }
    Ok(registry)
}

// ---------------------------------------------------------------------------
// CommandOracle
// ---------------------------------------------------------------------------

/// Leadership probe backed by an external command.
///
/// Exit 0 means this node is the leader, exit 1 means standby. Any other
/// exit, death by signal, spawn failure or timeout is an [`ElectionError`]
/// and the tick is skipped.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, ElectionError> {
        let (program, args) = split_command(command)
            .ok_or_else(|| ElectionError::Command("empty probe command".to_string()))?;
        Ok(Self {
            program,
            args,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl LeadershipOracle for CommandOracle {
    async fn is_leader(&self) -> Result<bool, ElectionError> {
        let output = run_command(&self.program, &self.args, Some(self.timeout))
            .await
            .map_err(|failure| match failure {
                Failure::Spawn(e) => ElectionError::Command(format!("{}: {e}", self.program)),
                Failure::Timeout(limit) => ElectionError::Timeout(limit),
            })?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(ElectionError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_excerpt(&output)
            ))),
        }
    }
}

/// Pick the oracle described by the `[election]` section.
pub fn oracle_from_config(
    cfg: &ElectionConfig,
) -> Result<Arc<dyn LeadershipOracle>, ElectionError> {
    let oracle: Arc<dyn LeadershipOracle> = match cfg.mode {
        ElectionMode::Standalone => Arc::new(StaticOracle::leader()),
        ElectionMode::Passive => Arc::new(StaticOracle::standby()),
        ElectionMode::Command => Arc::new(CommandOracle::new(&cfg.command, cfg.timeout())?),
    };
    Ok(oracle)
}
