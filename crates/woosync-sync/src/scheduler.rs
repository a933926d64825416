//! # Scheduler
//!
//! Periodic passes that keep WooCommerce in line with the ERP even when a
//! hook was missed.
//!
//! ## Tasks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Scheduler Loop                                 │
//! │                                                                         │
//! │  every stock_sweep_interval ───────► update_stock_levels_for_all_...   │
//! │                                       (enqueues UpdateStockLevels × N)  │
//! │                                                                         │
//! │  every price_sync_interval ────────► enqueue ScheduledPriceSync (long) │
//! │                                       (job takes the 4 h price lock)    │
//! │                                                                         │
//! │  every request_log_cleanup_interval ► delete request log rows older    │
//! │                                       than retention_days               │
//! │                                                                         │
//! │  shutdown ─────────────────────────► break                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first run of each task happens one interval after start. An interval
//! of zero disables the task.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{error, info};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hooks;
use crate::queue::{JobOptions, QueueName, SyncJob};

/// A periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    StockSweep,
    PriceSync,
    RequestLogCleanup,
}

impl std::fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduledTask::StockSweep => write!(f, "stock_sweep"),
            ScheduledTask::PriceSync => write!(f, "price_sync"),
            ScheduledTask::RequestLogCleanup => write!(f, "request_log_cleanup"),
        }
    }
}

/// Runs the periodic tasks.
pub struct Scheduler {
    ctx: SyncContext,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Triggers shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::Internal("Scheduler already stopped".into()))
    }
}

fn ticker(secs: u64) -> Option<Interval> {
    if secs == 0 {
        return None;
    }
    let period = Duration::from_secs(secs);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Scheduler {
    pub fn new(ctx: SyncContext) -> (Self, SchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (Scheduler { ctx, shutdown_rx }, SchedulerHandle { shutdown_tx })
    }

    /// Runs until shut down. Spawn this as a background task.
    pub async fn run(mut self) {
        let settings = self.ctx.config.scheduler.clone();
        info!(
            stock_sweep_secs = settings.stock_sweep_interval_secs,
            price_sync_secs = settings.price_sync_interval_secs,
            cleanup_secs = settings.request_log_cleanup_interval_secs,
            "Scheduler starting"
        );

        let mut stock = ticker(settings.stock_sweep_interval_secs);
        let mut price = ticker(settings.price_sync_interval_secs);
        let mut cleanup = ticker(settings.request_log_cleanup_interval_secs);

        loop {
            let task = tokio::select! {
                _ = tick(&mut stock) => ScheduledTask::StockSweep,
                _ = tick(&mut price) => ScheduledTask::PriceSync,
                _ = tick(&mut cleanup) => ScheduledTask::RequestLogCleanup,
                _ = self.shutdown_rx.recv() => {
                    info!("Scheduler shutting down");
                    break;
                }
            };

            if let Err(e) = self.run_task(task).await {
                error!(task = %task, error = %e, "Scheduled task failed");
            }
        }

        info!("Scheduler stopped");
    }

    /// Runs one task now.
    pub async fn run_task(&self, task: ScheduledTask) -> SyncResult<()> {
        info!(task = %task, "Running scheduled task");

        match task {
            ScheduledTask::StockSweep => {
                hooks::update_stock_levels_for_all_enabled_items(&self.ctx).await?;
            }
            ScheduledTask::PriceSync => {
                let options = JobOptions::new(QueueName::Long, self.ctx.config.price.job_timeout());
                self.ctx.queue.enqueue(SyncJob::ScheduledPriceSync, options).await?;
            }
            ScheduledTask::RequestLogCleanup => {
                let days = self.ctx.config.request_log.retention_days;
                let deleted = self.ctx.db.request_log().delete_older_than(days).await?;
                info!(deleted, days, "Request log cleaned up");
            }
        }

        Ok(())
    }
}
