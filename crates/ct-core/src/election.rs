use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Reasons a leadership query could not produce an answer.
///
/// None of these are fatal: the caretaker skips the tick and asks again on
/// the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElectionError {
    /// The coordination backend could not be reached or gave no verdict.
    #[error("election state unavailable: {0}")]
    Unavailable(String),

    /// The query did not finish within the allotted time.
    #[error("leadership query timed out after {0:?}")]
    Timeout(Duration),

    /// An external probe command failed to run or exited unexpectedly.
    #[error("election probe failed: {0}")]
    Command(String),
}

// ---------------------------------------------------------------------------
// LeadershipOracle
// ---------------------------------------------------------------------------

/// Answers whether this process currently holds cluster leadership.
///
/// Implementations are consulted once per tick and must be cheap to call
/// repeatedly. A slow implementation only delays its own tick; the caretaker
/// bounds every query with a timeout.
#[async_trait::async_trait]
pub trait LeadershipOracle: Send + Sync {
    /// `Ok(true)` when this process is the elected leader, `Ok(false)` when it
    /// is a passive standby.
    async fn is_leader(&self) -> Result<bool, ElectionError>;
}

/// An oracle with a fixed answer.
///
/// `StaticOracle::leader()` suits single-node deployments where the process
/// is always responsible for maintenance; `StaticOracle::standby()` keeps a
/// node permanently passive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticOracle {
    is_leader: bool,
}

impl StaticOracle {
    pub fn leader() -> Self {
        Self { is_leader: true }
    }

    pub fn standby() -> Self {
        Self { is_leader: false }
    }
}

#[async_trait::async_trait]
impl LeadershipOracle for StaticOracle {
    async fn is_leader(&self) -> Result<bool, ElectionError> {
        Ok(self.is_leader)
    }
}

// ---------------------------------------------------------------------------
// SharedElection
// ---------------------------------------------------------------------------

/// Election verdict as last published by whatever drives the election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionState {
    Leader,
    Standby,
    Unavailable(String),
}

/// In-process election state shared between an election driver and the
/// caretaker.
///
/// The driver (a lease renewer, a consensus client, a test) publishes the
/// current verdict with [`set`](Self::set); the caretaker reads it through
/// [`LeadershipOracle`]. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SharedElection {
    tx: Arc<watch::Sender<ElectionState>>,
}

impl SharedElection {
    /// Start as a standby until the driver says otherwise.
    pub fn new() -> Self {
        Self::with_state(ElectionState::Standby)
    }

    pub fn with_state(state: ElectionState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a new verdict. Returns the previous one.
    pub fn set(&self, state: ElectionState) -> ElectionState {
        self.tx.send_replace(state)
    }

    pub fn state(&self) -> ElectionState {
        self.tx.borrow().clone()
    }
}

impl Default for SharedElection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LeadershipOracle for SharedElection {
    async fn is_leader(&self) -> Result<bool, ElectionError> {
        match self.state() {
            ElectionState::Leader => Ok(true),
            ElectionState::Standby => Ok(false),
            ElectionState::Unavailable(reason) => Err(ElectionError::Unavailable(reason)),
        }
    }
}
