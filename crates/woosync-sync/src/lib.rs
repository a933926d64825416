//! # woosync-sync: Hooks, Queue and Workers for WooSync
//!
//! This crate turns ERP events into background jobs and runs those jobs
//! against WooCommerce stores.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        WooSync Worker                                   │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │     hooks      │  │   Scheduler    │  │  manual triggers       │    │
//! │  │ stock document │  │ daily sweeps   │  │  (cache debounced)     │    │
//! │  │ item price     │  │ log cleanup    │  │                        │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          │ CommitScope       │                       │                  │
//! │          ▼                   ▼                       ▼                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            TokioJobQueue (short / default / long)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       JobDispatcher                             │   │
//! │  │   StockSynchronizer                 PriceSynchronizer           │   │
//! │  │   PUT stock_quantity                GET + PUT regular_price     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │              WooCommerceApi (reqwest, request log)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`hooks`] - Entry points for ERP events and manual triggers
//! - [`queue`] - Jobs, named queues, commit scopes
//! - [`dispatch`] - Job → synchroniser routing
//! - [`stock_sync`] - Stock level pushes
//! - [`price_sync`] - Price planning and batch pushes
//! - [`scheduler`] - Periodic passes
//! - [`woocommerce`] - REST client
//! - [`cache`] - Locks and debounce keys (memory or Redis)
//! - [`context`] - Shared handles
//! - [`config`] - Worker configuration
//! - [`error`] - Sync error types
//! - `testing` - In-memory queue and store fakes (tests, or the `testing` feature)

pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod price_sync;
pub mod queue;
pub mod scheduler;
pub mod stock_sync;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod woocommerce;

pub use cache::{Cache, MemoryCache, RedisCache};
pub use config::WorkerConfig;
pub use context::SyncContext;
pub use dispatch::JobDispatcher;
pub use error::{SyncError, SyncResult};
pub use hooks::HookOutcome;
pub use price_sync::{PricePassTracker, PriceSyncReport, PriceSynchronizer};
pub use queue::{CommitScope, JobHandler, JobOptions, JobQueue, QueueHandle, QueueName, SyncJob, TokioJobQueue};
pub use scheduler::{ScheduledTask, Scheduler, SchedulerHandle};
pub use stock_sync::{StockSyncReport, StockSynchronizer};
pub use woocommerce::{ApiFactory, ApiResponse, HttpApiFactory, WooCommerceApi};
