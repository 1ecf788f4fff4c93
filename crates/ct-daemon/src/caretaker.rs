use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ct_core::config::{CaretakerConfig, OverlapPolicy};
use ct_core::election::{ElectionError, LeadershipOracle};
use ct_core::job::{JobRegistry, MaintenanceJob};
use ct_core::shutdown::ShutdownSignal;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default period between leadership checks.
const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(60);
/// Default upper bound on a single leadership query.
const DEFAULT_LEADERSHIP_TIMEOUT: Duration = Duration::from_secs(10);

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime knobs for a [`Caretaker`]. Fixed for the lifetime of the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretakerSettings {
    /// Time between two leadership checks.
    pub tick_period: Duration,
    /// Longest a single leadership query may take before the tick is skipped.
    pub leadership_timeout: Duration,
    /// Behaviour when a job is still running from an earlier tick.
    pub overlap: OverlapPolicy,
}

impl Default for CaretakerSettings {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            leadership_timeout: DEFAULT_LEADERSHIP_TIMEOUT,
            overlap: OverlapPolicy::Concurrent,
        }
    }
}

impl CaretakerSettings {
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    pub fn with_leadership_timeout(mut self, timeout: Duration) -> Self {
        self.leadership_timeout = timeout;
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Reject settings the tick loop cannot run with.
    pub fn validate(&self) -> Result<(), CaretakerError> {
        if self.tick_period.is_zero() {
            return Err(CaretakerError::InvalidSettings(
                "tick_period must be greater than zero".to_string(),
            ));
        }
        if self.leadership_timeout.is_zero() {
            return Err(CaretakerError::InvalidSettings(
                "leadership_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&CaretakerConfig> for CaretakerSettings {
    fn from(cfg: &CaretakerConfig) -> Self {
        Self {
            tick_period: cfg.tick_period(),
            leadership_timeout: cfg.leadership_timeout(),
            overlap: cfg.overlap,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle & outcomes
// ---------------------------------------------------------------------------

/// Lifecycle of a [`Caretaker`]: `Idle -> Running -> Stopped`, no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

impl RunState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            STATE_IDLE => RunState::Idle,
            STATE_RUNNING => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaretakerError {
    /// `run` was called on an instance that is not `Idle`.
    #[error("caretaker already started (state: {0:?})")]
    AlreadyStarted(RunState),
    #[error("invalid caretaker settings: {0}")]
    InvalidSettings(String),
}

/// What a single tick evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// This node is the leader; `launched` jobs were spawned and `skipped`
    /// were held back by the overlap policy.
    Dispatched { launched: usize, skipped: usize },
    /// Another node is the leader.
    Standby,
    /// Leadership could not be determined; nothing was dispatched.
    OracleFailed(ElectionError),
    /// Shutdown has been requested; the oracle was not consulted.
    ShuttingDown,
}

/// Point-in-time view of the caretaker's in-memory counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub leader_ticks: u64,
    pub standby_ticks: u64,
    pub oracle_failures: u64,
    pub jobs_dispatched: u64,
    pub jobs_skipped_overlap: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_in_flight: usize,
    pub last_tick_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    leader_ticks: AtomicU64,
    standby_ticks: AtomicU64,
    oracle_failures: AtomicU64,
    jobs_dispatched: AtomicU64,
    jobs_skipped_overlap: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    /// Unix millis of the last evaluated tick; 0 until the first one.
    last_tick_ms: AtomicI64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// A registered job plus the number of its invocations still running.
struct JobSlot {
    job: Arc<dyn MaintenanceJob>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements a job's in-flight count when the supervising task ends,
/// whether the job returned, failed or panicked.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Caretaker
// ---------------------------------------------------------------------------

/// Runs periodic maintenance jobs, but only while this node is the leader.
///
/// Every `tick_period` the caretaker asks its [`LeadershipOracle`] for a
/// verdict. On the leader it spawns every registered job as an independent
/// tokio task and goes straight back to waiting: job runtime never delays
/// the next tick, and a failing or panicking job never affects the others
/// or the loop. Standby nodes do nothing. An oracle error skips the tick.
///
/// ```ignore
/// let caretaker = Arc::new(Caretaker::with_defaults(oracle, registry));
/// let handle = tokio::spawn({
///     let caretaker = caretaker.clone();
///     async move { caretaker.run().await }
/// });
/// // ...
/// caretaker.stop();
/// handle.await??;
/// ```
pub struct Caretaker {
    settings: CaretakerSettings,
    oracle: Arc<dyn LeadershipOracle>,
    slots: Vec<JobSlot>,
    shutdown: ShutdownSignal,
    state: AtomicU8,
    /// Held across the leadership query and dispatch of one tick.
    evaluating: Mutex<()>,
    counters: Arc<Counters>,
}

impl Caretaker {
    pub fn new(
        settings: CaretakerSettings,
        oracle: Arc<dyn LeadershipOracle>,
        registry: JobRegistry,
    ) -> Self {
        let slots = registry
            .iter()
            .map(|job| JobSlot {
                job: Arc::clone(job),
                in_flight: Arc::new(AtomicUsize::new(0)),
            })
            .collect();
        Self {
            settings,
            oracle,
            slots,
            shutdown: ShutdownSignal::new(),
            state: AtomicU8::new(STATE_IDLE),
            evaluating: Mutex::new(()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a caretaker with the default one-minute tick.
    pub fn with_defaults(oracle: Arc<dyn LeadershipOracle>, registry: JobRegistry) -> Self {
        Self::new(CaretakerSettings::default(), oracle, registry)
    }

    pub fn settings(&self) -> &CaretakerSettings {
        &self.settings
    }

    pub fn state(&self) -> RunState {
        RunState::from_raw(self.state.load(Ordering::SeqCst))
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.job.name()).collect()
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Ask the loop to exit. Never blocks and may be called any number of
    /// times; a stop issued before [`run`](Self::run) makes `run` return
    /// without ticking.
    pub fn stop(&self) {
        if self.shutdown.trigger() {
            info!("stopping caretaker");
        }
    }

    /// Tick until [`stop`](Self::stop) is called.
    ///
    /// Returns once shutdown is observed. Jobs dispatched by earlier ticks
    /// keep running; they are neither awaited nor cancelled. An instance can
    /// run only once. Settings that fail [`CaretakerSettings::validate`] are
    /// rejected before the instance leaves `Idle`.
    pub async fn run(&self) -> Result<(), CaretakerError> {
        self.settings.validate()?;
        self.state
            .compare_exchange(STATE_IDLE, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|raw| CaretakerError::AlreadyStarted(RunState::from_raw(raw)))?;

        // Subscribe before checking the flag so a concurrent stop is not lost.
        let mut shutdown_rx = self.shutdown.subscribe();

        info!(
            tick_period_ms = self.settings.tick_period.as_millis() as u64,
            leadership_timeout_ms = self.settings.leadership_timeout.as_millis() as u64,
            overlap = ?self.settings.overlap,
            jobs = self.slots.len(),
            "starting caretaker"
        );

        if self.shutdown.is_shutting_down() {
            info!("shutdown requested before start, not ticking");
        } else {
            self.tick_loop(&mut shutdown_rx).await;
        }

        self.state.store(STATE_STOPPED, Ordering::SeqCst);
        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            leader_ticks = stats.leader_ticks,
            oracle_failures = stats.oracle_failures,
            jobs_in_flight = stats.jobs_in_flight,
            "caretaker stopped"
        );
        Ok(())
    }

    async fn tick_loop(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.settings.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Consume the immediate first tick; the first check happens one period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, leaving tick loop");
                    break;
                }
                _ = ticker.tick() => {
                    // A slow oracle must not hold up shutdown.
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            info!("shutdown signal received during leadership check, leaving tick loop");
                            break;
                        }
                        _ = self.tick() => {}
                    }
                }
            }
        }
    }

    /// Evaluate one tick right now: query leadership and, on the leader,
    /// dispatch every job. Does nothing once shutdown has been requested.
    ///
    /// Evaluations are serialized: a call made while another tick is being
    /// evaluated (by the loop or another caller) waits for it to finish.
    pub async fn tick(&self) -> TickOutcome {
        let _evaluating = self.evaluating.lock().await;
        if self.shutdown.is_shutting_down() {
            return TickOutcome::ShuttingDown;
        }

        bump(&self.counters.ticks, 1);
        self.counters
            .last_tick_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);

        match self.query_leadership().await {
            Ok(true) => {
                bump(&self.counters.leader_ticks, 1);
                self.dispatch()
            }
            Ok(false) => {
                bump(&self.counters.standby_ticks, 1);
                debug!("not the elected leader, standing by");
                TickOutcome::Standby
            }
            Err(e) => {
                bump(&self.counters.oracle_failures, 1);
                warn!(error = %e, "unable to determine leadership, skipping tick");
                TickOutcome::OracleFailed(e)
            }
        }
    }

    async fn query_leadership(&self) -> Result<bool, ElectionError> {
        let timeout = self.settings.leadership_timeout;
        match tokio::time::timeout(timeout, self.oracle.is_leader()).await {
            Ok(verdict) => verdict,
            Err(_) => Err(ElectionError::Timeout(timeout)),
        }
    }

    /// Spawn every job without waiting for any of them.
    fn dispatch(&self) -> TickOutcome {
        let mut launched = 0;
        let mut skipped = 0;

        for slot in &self.slots {
            if self.settings.overlap == OverlapPolicy::SkipIfRunning
                && slot.in_flight.load(Ordering::SeqCst) > 0
            {
                debug!(job = %slot.job.name(), "previous run still in flight, skipping");
                skipped += 1;
                continue;
            }

            // Increments only happen under `evaluating`, so the check above
            // cannot be raced by another dispatch.
            slot.in_flight.fetch_add(1, Ordering::SeqCst);
            let guard = InFlightGuard(Arc::clone(&slot.in_flight));
            let job = Arc::clone(&slot.job);
            let counters = Arc::clone(&self.counters);
            tokio::spawn(supervise(job, guard, counters));
            launched += 1;
        }

        bump(&self.counters.jobs_dispatched, launched as u64);
        bump(&self.counters.jobs_skipped_overlap, skipped as u64);
        debug!(launched, skipped, "maintenance jobs dispatched");

        TickOutcome::Dispatched { launched, skipped }
    }

    /// Snapshot the in-memory counters.
    pub fn stats(&self) -> TickStats {
        let c = &self.counters;
        let last_tick_ms = c.last_tick_ms.load(Ordering::Relaxed);
        TickStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            leader_ticks: c.leader_ticks.load(Ordering::Relaxed),
            standby_ticks: c.standby_ticks.load(Ordering::Relaxed),
            oracle_failures: c.oracle_failures.load(Ordering::Relaxed),
            jobs_dispatched: c.jobs_dispatched.load(Ordering::Relaxed),
            jobs_skipped_overlap: c.jobs_skipped_overlap.load(Ordering::Relaxed),
            jobs_succeeded: c.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: c.jobs_failed.load(Ordering::Relaxed),
            jobs_in_flight: self
                .slots
                .iter()
                .map(|slot| slot.in_flight.load(Ordering::SeqCst))
                .sum(),
            last_tick_at: if last_tick_ms == 0 {
                None
            } else {
                DateTime::<Utc>::from_timestamp_millis(last_tick_ms)
            },
        }
    }
}

/// Run one job on its own task and report how it ended.
///
/// The inner spawn turns a panic into a `JoinError` so it can be logged and
/// counted like any other failure.
async fn supervise(job: Arc<dyn MaintenanceJob>, guard: InFlightGuard, counters: Arc<Counters>) {
    let started = tokio::time::Instant::now();
    let runner = Arc::clone(&job);
    let result = tokio::spawn(async move { runner.run().await }).await;
    drop(guard);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(())) => {
            bump(&counters.jobs_succeeded, 1);
            debug!(job = %job.name(), elapsed_ms, "maintenance job finished");
        }
        Ok(Err(e)) => {
            bump(&counters.jobs_failed, 1);
            warn!(job = %job.name(), error = %e, elapsed_ms, "maintenance job failed");
        }
        Err(e) => {
            bump(&counters.jobs_failed, 1);
            error!(
                job = %job.name(),
                panicked = e.is_panic(),
                elapsed_ms,
                "maintenance job aborted"
            );
        }
    }
}
