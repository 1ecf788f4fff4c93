//! caretaker daemon: runs leader-gated periodic maintenance jobs.

use anyhow::{Context, Result};
use ct_core::config::{Config, LogFormat};
use ct_daemon::daemon::Daemon;
use tracing::{error, info};

/// Environment variable naming an explicit config file.
const CONFIG_ENV: &str = "CARETAKER_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    let level = &config.general.log_level;
    match config.general.log_format {
        LogFormat::Human => ct_telemetry::logging::init_logging("caretaker", level),
        LogFormat::Json => ct_telemetry::logging::init_logging_json("caretaker", level),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "caretaker daemon starting"
    );

    let daemon = Daemon::from_config(config)?;
    if let Err(e) = daemon.run_until_signal(wait_for_signal()).await {
        error!(error = %e, "daemon execution failed");
        return Err(e);
    }
    Ok(())
}

fn load_config() -> Result<Config> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => Config::load_from(&path)
            .with_context(|| format!("failed to load config from {path}")),
        _ => Config::load()
            .with_context(|| format!("failed to load {}", Config::default_path().display())),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
