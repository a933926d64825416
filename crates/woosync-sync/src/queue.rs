//! # Job Queue
//!
//! In-process background jobs on three named queues.
//!
//! ## Queue Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TokioJobQueue                                   │
//! │                                                                         │
//! │  hooks / scheduler                                                     │
//! │       │  enqueue(SyncJob, JobOptions { queue, timeout, after_commit }) │
//! │       ▼                                                                 │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐                           │
//! │  │  short   │   │ default  │   │   long   │   unbounded mpsc          │
//! │  └────┬─────┘   └────┬─────┘   └────┬─────┘                           │
//! │       │ N workers    │ N workers    │ N workers                        │
//! │       ▼              ▼              ▼                                   │
//! │  spawn(handler.handle(job)) under tokio::time::timeout(options.timeout)│
//! │       │                                                                 │
//! │       ├── Ok            → debug                                        │
//! │       ├── Err(e)        → error + handler.report_failure               │
//! │       ├── panicked      → error + handler.report_failure               │
//! │       └── timed out     → abort + error + handler.report_failure       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deferred enqueue
//! Hooks run inside the caller's save. Jobs they create go through a
//! [`CommitScope`] and only reach the queue when the scope commits; a
//! rollback, or dropping the scope, discards them.
//!
//! Jobs are never retried. Ordering between jobs is not guaranteed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use woosync_core::{EligiblePrice, PriceChange};

use crate::config::QueueSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Jobs
// =============================================================================

/// Named queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Short,
    Default,
    Long,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [QueueName::Short, QueueName::Default, QueueName::Long];
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueName::Short => write!(f, "short"),
            QueueName::Default => write!(f, "default"),
            QueueName::Long => write!(f, "long"),
        }
    }
}

/// How and when a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub queue: QueueName,
    pub timeout: Duration,
    /// Hold the job until the enclosing [`CommitScope`] commits.
    pub after_commit: bool,
}

impl JobOptions {
    pub fn new(queue: QueueName, timeout: Duration) -> Self {
        JobOptions {
            queue,
            timeout,
            after_commit: false,
        }
    }

    pub fn after_commit(mut self) -> Self {
        self.after_commit = true;
        self
    }
}

/// A unit of background work: task name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum SyncJob {
    /// Push stock levels of these items to every linked store.
    UpdateStockLevels { item_codes: Vec<String> },

    /// Plan price batches for one item or the whole catalog.
    SyncItemPrices {
        item_code: Option<String>,
        change: Option<PriceChange>,
    },

    /// Compare and push prices of one batch of rows to one store.
    SyncItemPriceBatch {
        server: String,
        rows: Vec<EligiblePrice>,
        change: Option<PriceChange>,
        /// Full price pass this batch belongs to, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pass: Option<u64>,
    },

    /// The scheduled full-catalog price pass, guarded by the price lock.
    ScheduledPriceSync,
}

impl SyncJob {
    /// Task name, as it appears in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncJob::UpdateStockLevels { .. } => "update_stock_levels",
            SyncJob::SyncItemPrices { .. } => "sync_item_prices",
            SyncJob::SyncItemPriceBatch { .. } => "sync_item_price_batch",
            SyncJob::ScheduledPriceSync => "scheduled_price_sync",
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Accepts jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: SyncJob, options: JobOptions) -> SyncResult<()>;

    /// Jobs waiting (not yet picked up) on `queue`, when the backend knows.
    fn pending(&self, _queue: QueueName) -> usize {
        0
    }
}

/// Runs jobs pulled off a queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &SyncJob) -> SyncResult<()>;

    /// Called after a job failed or timed out.
    async fn report_failure(&self, _job: &SyncJob, _error: &SyncError) {}
}

// =============================================================================
// Commit Scope
// =============================================================================

/// Collects `after_commit` jobs until the surrounding save commits.
///
/// ## Usage
/// ```rust,ignore
/// let mut scope = ctx.scope();
/// db.item_prices().upsert(&price).await?;
/// hooks::on_item_price_saved(&ctx, &mut scope, &price).await?;
/// scope.commit().await?;   // jobs reach the queue here
/// ```
pub struct CommitScope {
    queue: Arc<dyn JobQueue>,
    deferred: Vec<(SyncJob, JobOptions)>,
}

impl CommitScope {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        CommitScope {
            queue,
            deferred: Vec::new(),
        }
    }

    /// Enqueues now, or defers when `options.after_commit` is set.
    pub async fn enqueue(&mut self, job: SyncJob, options: JobOptions) -> SyncResult<()> {
        if options.after_commit {
            debug!(job = job.name(), "Deferring job until commit");
            self.deferred.push((job, options));
            Ok(())
        } else {
            self.queue.enqueue(job, options).await
        }
    }

    /// Number of jobs waiting for commit.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Releases every deferred job to the queue, in enqueue order.
    pub async fn commit(mut self) -> SyncResult<usize> {
        let jobs = std::mem::take(&mut self.deferred);
        let count = jobs.len();
        for (job, options) in jobs {
            self.queue.enqueue(job, options).await?;
        }
        Ok(count)
    }

    /// Discards every deferred job.
    pub fn rollback(mut self) -> usize {
        let count = self.deferred.len();
        self.deferred.clear();
        count
    }
}

impl Drop for CommitScope {
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            debug!(
                discarded = self.deferred.len(),
                "Commit scope dropped without commit"
            );
        }
    }
}

// =============================================================================
// Tokio Queue
// =============================================================================

struct QueuedJob {
    id: Uuid,
    job: SyncJob,
    options: JobOptions,
}

/// Sending half of the three queues. Cheap to clone.
#[derive(Clone)]
pub struct TokioJobQueue {
    short: mpsc::UnboundedSender<QueuedJob>,
    default: mpsc::UnboundedSender<QueuedJob>,
    long: mpsc::UnboundedSender<QueuedJob>,
    pending: Arc<[AtomicUsize; 3]>,
}

/// Receiving half, waiting for a handler.
pub struct QueueWorkers {
    receivers: Vec<(QueueName, usize, mpsc::UnboundedReceiver<QueuedJob>)>,
    pending: Arc<[AtomicUsize; 3]>,
}

/// Handle for stopping the workers.
pub struct QueueHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

fn slot(queue: QueueName) -> usize {
    match queue {
        QueueName::Short => 0,
        QueueName::Default => 1,
        QueueName::Long => 2,
    }
}

impl TokioJobQueue {
    /// Creates the queues. Nothing runs until [`QueueWorkers::start`].
    pub fn new(settings: &QueueSettings) -> (Self, QueueWorkers) {
        let (short_tx, short_rx) = mpsc::unbounded_channel();
        let (default_tx, default_rx) = mpsc::unbounded_channel();
        let (long_tx, long_rx) = mpsc::unbounded_channel();
        let pending = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)]);

        let queue = TokioJobQueue {
            short: short_tx,
            default: default_tx,
            long: long_tx,
            pending: pending.clone(),
        };

        let workers = QueueWorkers {
            receivers: vec![
                (QueueName::Short, settings.short_workers.max(1), short_rx),
                (QueueName::Default, settings.default_workers.max(1), default_rx),
                (QueueName::Long, settings.long_workers.max(1), long_rx),
            ],
            pending,
        };

        (queue, workers)
    }

    fn sender(&self, queue: QueueName) -> &mpsc::UnboundedSender<QueuedJob> {
        match queue {
            QueueName::Short => &self.short,
            QueueName::Default => &self.default,
            QueueName::Long => &self.long,
        }
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: SyncJob, options: JobOptions) -> SyncResult<()> {
        let queued = QueuedJob {
            id: Uuid::new_v4(),
            job,
            options,
        };

        debug!(
            job_id = %queued.id,
            job = queued.job.name(),
            queue = %options.queue,
            timeout_secs = options.timeout.as_secs(),
            "Enqueuing job"
        );

        self.pending[slot(options.queue)].fetch_add(1, Ordering::SeqCst);
        self.sender(options.queue).send(queued).map_err(|_| {
            self.pending[slot(options.queue)].fetch_sub(1, Ordering::SeqCst);
            SyncError::QueueClosed(options.queue.to_string())
        })
    }

    fn pending(&self, queue: QueueName) -> usize {
        self.pending[slot(queue)].load(Ordering::SeqCst)
    }
}

impl QueueWorkers {
    /// Spawns the worker tasks.
    pub fn start(self, handler: Arc<dyn JobHandler>) -> QueueHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        for (queue, workers, rx) in self.receivers {
            info!(queue = %queue, workers, "Starting queue workers");
            let rx = Arc::new(Mutex::new(rx));

            for worker in 0..workers {
                tasks.push(tokio::spawn(worker_loop(
                    queue,
                    worker,
                    rx.clone(),
                    handler.clone(),
                    self.pending.clone(),
                    shutdown_rx.clone(),
                )));
            }
        }

        QueueHandle { shutdown_tx, tasks }
    }
}

impl QueueHandle {
    /// Stops taking new jobs and waits for running ones to finish.
    pub async fn shutdown(self) {
        info!("Queue workers shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Queue workers stopped");
    }
}

async fn worker_loop(
    queue: QueueName,
    worker: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    handler: Arc<dyn JobHandler>,
    pending: Arc<[AtomicUsize; 3]>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = tokio::select! {
            _ = shutdown_rx.changed() => break,
            next = async { rx.lock().await.recv().await } => next,
        };

        let Some(queued) = next else {
            debug!(queue = %queue, worker, "Queue closed");
            break;
        };
        pending[slot(queue)].fetch_sub(1, Ordering::SeqCst);

        run_job(queue, worker, queued, handler.clone()).await;
    }
}

async fn run_job(queue: QueueName, worker: usize, queued: QueuedJob, handler: Arc<dyn JobHandler>) {
    let QueuedJob { id, job, options } = queued;
    debug!(job_id = %id, job = job.name(), queue = %queue, worker, "Job started");

    // Own task, so a panicking job cannot take the worker down with it.
    let mut task = {
        let handler = handler.clone();
        let job = job.clone();
        tokio::spawn(async move { handler.handle(&job).await })
    };

    let failure = match tokio::time::timeout(options.timeout, &mut task).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(e))) => Some(e),
        Ok(Err(join)) if join.is_panic() => Some(SyncError::JobPanicked {
            job: job.name().to_string(),
            message: panic_message(join.into_panic()),
        }),
        Ok(Err(join)) => Some(SyncError::Internal(format!("job {} cancelled: {}", job.name(), join))),
        Err(_) => {
            task.abort();
            Some(SyncError::JobTimedOut {
                job: job.name().to_string(),
                secs: options.timeout.as_secs(),
            })
        }
    };

    match failure {
        None => debug!(job_id = %id, job = job.name(), "Job finished"),
        Some(e) => {
            error!(job_id = %id, job = job.name(), queue = %queue, error = %e, "Job failed");
            handler.report_failure(&job, &e).await;
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
