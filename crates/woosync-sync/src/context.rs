//! # Sync Context
//!
//! Everything a hook or a job needs, bundled so it can be cloned into tasks.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncContext                                    │
//! │                                                                         │
//! │   db ─────── Database (servers, items, bins, prices, logs)             │
//! │   queue ──── Arc<dyn JobQueue>                                          │
//! │   cache ──── Arc<dyn Cache>       (price lock, manual debounce)        │
//! │   api ────── Arc<dyn ApiFactory>  (one WooCommerceApi per server)      │
//! │   config ─── Arc<WorkerConfig>                                          │
//! │   price_pass Arc<PricePassTracker> (batches left in the full pass)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tracing::{error, warn};

use woosync_db::Database;

use crate::cache::Cache;
use crate::config::WorkerConfig;
use crate::price_sync::PricePassTracker;
use crate::queue::{CommitScope, JobQueue};
use crate::woocommerce::ApiFactory;

/// Shared handles for hooks and jobs. Cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub db: Database,
    pub queue: Arc<dyn JobQueue>,
    pub cache: Arc<dyn Cache>,
    pub api: Arc<dyn ApiFactory>,
    pub config: Arc<WorkerConfig>,
    pub price_pass: Arc<PricePassTracker>,
}

impl SyncContext {
    pub fn new(
        db: Database,
        queue: Arc<dyn JobQueue>,
        cache: Arc<dyn Cache>,
        api: Arc<dyn ApiFactory>,
        config: WorkerConfig,
    ) -> Self {
        SyncContext {
            db,
            queue,
            cache,
            api,
            config: Arc::new(config),
            price_pass: Arc::new(PricePassTracker::new()),
        }
    }

    /// A fresh [`CommitScope`] over this context's queue.
    pub fn scope(&self) -> CommitScope {
        CommitScope::new(self.queue.clone())
    }

    /// Records an error in the error log and in tracing.
    ///
    /// A failed insert is only warned about; logging never fails the caller.
    pub async fn log_error(&self, title: &str, message: &str) {
        error!(title, message, "Sync error");

        if let Err(e) = self.db.error_log().insert(title, message).await {
            warn!(error = %e, title, "Failed to write error log");
        }
    }
}
