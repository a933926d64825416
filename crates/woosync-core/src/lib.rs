//! # woosync-core: Pure Sync Logic for WooSync
//!
//! This crate holds every decision WooSync makes, as pure functions with zero
//! I/O dependencies. The workers in `woosync-sync` load data, call into here,
//! and perform the resulting HTTP calls.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        WooSync Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 ERP (document hooks, scheduler)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            woosync-sync (hooks, queue, workers)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ woosync-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │   price   │  │ endpoint  │  │   │
//! │  │   │  Server   │  │ trigger   │  │ compare   │  │ product / │  │   │
//! │  │   │  Item,Bin │  │ quantity  │  │ batches   │  │ variation │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - ERP records (server, item, link, bin, price, documents)
//! - [`stock`] - Stock hook decision and per-server quantity
//! - [`price`] - Effective rate, remote price coercion, batching
//! - [`endpoint`] - Product / variation REST paths
//! - [`validation`] - Server configuration checks
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod endpoint;
pub mod error;
pub mod price;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use endpoint::ProductEndpoint;
pub use error::{CoreError, CoreResult, ValidationError};
pub use stock::{SkipReason, StockDecision, StockPush, StockTrigger};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Cache key guarding the scheduled full-catalog price pass.
pub const PRICE_SYNC_LOCK_KEY: &str = "woo_price_sync_lock";

/// Page size used when walking the whole item catalog.
pub const ITEM_PAGE_SIZE: u32 = 500;

/// Cache key debouncing manual price syncs of one item.
pub fn manual_price_sync_key(item_code: &str) -> String {
    format!("woo_price_manual_{}", item_code)
}

/// Cache key debouncing manual stock syncs of one item.
pub fn manual_stock_sync_key(item_code: &str) -> String {
    format!("woo_stock_manual_{}", item_code)
}
