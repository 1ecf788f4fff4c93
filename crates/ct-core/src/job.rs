use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure reported by a maintenance job.
///
/// Job errors stay inside the job's own task: the caretaker logs them and
/// moves on. They never reach the tick loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    #[error("job could not be started: {0}")]
    Spawn(String),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

// ---------------------------------------------------------------------------
// MaintenanceJob
// ---------------------------------------------------------------------------

/// One periodic maintenance operation.
///
/// Jobs are invoked at most once per leader tick and are never awaited by
/// the caretaker. They must tolerate running concurrently with a previous
/// invocation of themselves unless the caretaker is configured to skip
/// overlapping runs.
#[async_trait::async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Stable name used in logs and overlap bookkeeping.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), JobError>;
}

/// Adapts an async closure into a [`MaintenanceJob`].
///
/// ```ignore
/// let job = FnJob::new("expire-audit", || async {
///     store.expire_audit().await.map_err(|e| JobError::failed(e.to_string()))
/// });
/// ```
pub struct FnJob<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait::async_trait]
impl<F, Fut> MaintenanceJob for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), JobError> {
        (self.f)().await
    }
}

// ---------------------------------------------------------------------------
// JobRegistry
// ---------------------------------------------------------------------------

/// The fixed set of jobs fired on every leader tick.
///
/// Registration order is kept, but dispatch order within a tick is not part
/// of the contract.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<dyn MaintenanceJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job.
    pub fn register(&mut self, job: Arc<dyn MaintenanceJob>) -> &mut Self {
        self.jobs.push(job);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_job(mut self, job: impl MaintenanceJob + 'static) -> Self {
        self.jobs.push(Arc::new(job));
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MaintenanceJob>> {
        self.jobs.iter()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.names())
            .finish()
    }
}

impl FromIterator<Arc<dyn MaintenanceJob>> for JobRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn MaintenanceJob>>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}
