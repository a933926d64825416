//! # woosync-db: Database Layer for WooSync
//!
//! Local SQLite mirror of the ERP records the sync workers read (servers,
//! items, bins, prices) plus the worker's own logs. Uses sqlx for async
//! access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        WooSync Data Flow                                │
//! │                                                                         │
//! │  Queue worker (update_stock_levels / sync_item_price_batch)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   woosync-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  + patches   │  │   │
//! │  │   │               │    │ ServerRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ItemRepo      │    │ 001_init.sql │  │   │
//! │  │   │               │    │ BinRepo       │    │ 002_tax.sql  │  │   │
//! │  │   │               │    │ ItemPriceRepo │    │ v1 patches   │  │   │
//! │  │   │               │    │ Log repos     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded schema migrations
//! - [`patches`] - One-off data backfills
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use woosync_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("woosync.db")).await?;
//! let servers = db.servers().list_stock_enabled().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod patches;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use patches::PatchReport;
pub use pool::{Database, DbConfig};

pub use repository::{
    BinRepository, ErrorLogRepository, ItemPriceRepository, ItemRepository, RequestLogRepository,
    ServerRepository,
};
