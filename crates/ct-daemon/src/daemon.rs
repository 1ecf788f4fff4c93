use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use ct_core::config::Config;
use ct_core::election::LeadershipOracle;
use ct_core::job::JobRegistry;
use ct_core::shutdown::ShutdownSignal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::caretaker::{Caretaker, CaretakerError, CaretakerSettings};
use crate::command::{oracle_from_config, registry_from_config};

/// The caretaker process: configuration plus one [`Caretaker`].
///
/// Use [`run`](Self::run) for headless use (blocks until shutdown) or
/// [`start_embedded`](Self::start_embedded) to run the loop on a background
/// task inside a larger application.
pub struct Daemon {
    config: Config,
    caretaker: Arc<Caretaker>,
}

impl Daemon {
    /// Build the oracle and job registry described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let oracle =
            oracle_from_config(&config.election).context("failed to set up leadership oracle")?;
        let registry =
            registry_from_config(&config.jobs).context("failed to set up maintenance jobs")?;
        Ok(Self::with_parts(config, oracle, registry))
    }

    /// Build a daemon around an oracle and registry supplied by the caller.
    pub fn with_parts(
        config: Config,
        oracle: Arc<dyn LeadershipOracle>,
        registry: JobRegistry,
    ) -> Self {
        let settings = CaretakerSettings::from(&config.caretaker);
        let caretaker = Arc::new(Caretaker::new(settings, oracle, registry));
        Self { config, caretaker }
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.caretaker.shutdown_handle()
    }

    /// Send the shutdown signal.
    pub fn shutdown(&self) {
        self.caretaker.stop();
    }

    pub fn caretaker(&self) -> &Arc<Caretaker> {
        &self.caretaker
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn log_bootstrap(&self) {
        let jobs = self.caretaker.job_names();
        if jobs.is_empty() {
            warn!("no maintenance jobs configured; leader ticks will be no-ops");
        }
        info!(
            node = %self.config.general.node_name,
            election = ?self.config.election.mode,
            tick_period_secs = self.config.caretaker.tick_period_secs,
            jobs = ?jobs,
            "caretaker daemon bootstrap complete"
        );
    }

    /// Spawn the caretaker loop and return immediately.
    ///
    /// The caller keeps the `Daemon` and calls [`shutdown`](Self::shutdown)
    /// to stop; the returned handle resolves once the loop has exited.
    pub fn start_embedded(&self) -> JoinHandle<Result<(), CaretakerError>> {
        self.log_bootstrap();
        let caretaker = Arc::clone(&self.caretaker);
        tokio::spawn(async move { caretaker.run().await })
    }

    /// Run the caretaker inline until shutdown (blocking).
    pub async fn run(&self) -> Result<()> {
        self.log_bootstrap();
        self.caretaker
            .run()
            .await
            .context("caretaker loop failed to start")?;

        let stats = self.caretaker.stats();
        info!(
            ticks = stats.ticks,
            jobs_dispatched = stats.jobs_dispatched,
            jobs_failed = stats.jobs_failed,
            jobs_in_flight = stats.jobs_in_flight,
            "daemon stopped"
        );
        Ok(())
    }

    /// Run until `signal` resolves, then shut down and wait for the loop.
    ///
    /// An error from `signal` means termination requests can no longer be
    /// observed, so it is returned instead of leaving the loop unstoppable.
    pub async fn run_until_signal<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            received = signal => {
                if let Err(e) = received {
                    error!(error = %e, "failed to listen for shutdown signals");
                    self.shutdown();
                    run.await?;
                    return Err(e).context("failed to listen for shutdown signals");
                }
                info!("termination signal received, initiating shutdown");
                self.shutdown();
            }
        }

        run.await
    }
}
